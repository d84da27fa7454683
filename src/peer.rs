//! Client address extraction for logs and trace user context.

use std::net::{IpAddr, SocketAddr};

/// Host part of a peer address with the port dropped. IPv4-mapped IPv6
/// addresses (dual-stack listeners) are shown as plain IPv4.
pub fn client_ip(addr: &SocketAddr) -> String {
    canonical_ip(addr.ip()).to_string()
}

fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}
