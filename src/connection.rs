use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Transport-side view of a client connection as seen by request handling.
///
/// Requests only read the peer address and subscribe to the close signal; the
/// accept layer owns the socket itself.
pub trait Connection: Send + Sync {
    fn remote_addr(&self) -> SocketAddr;

    /// Cancelled when the connection goes away. Requests derive child tokens from it.
    fn close_token(&self) -> &CancellationToken;
}

/// Connection handle created by the accept loop for every client socket.
#[derive(Debug)]
pub struct ClientConnection {
    peer_addr: SocketAddr,
    closed: CancellationToken,
}

impl ClientConnection {
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self {
            peer_addr,
            closed: CancellationToken::new(),
        }
    }

    /// Signal that the client went away. Every request on this connection observes cancellation.
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            debug!("Client {} disconnected", self.peer_addr);
        }
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl Connection for ClientConnection {
    fn remote_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    fn close_token(&self) -> &CancellationToken {
        &self.closed
    }
}
