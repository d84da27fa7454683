//! Request normalization counters in Prometheus text format.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters (thread-safe, lock-free).
#[derive(Debug, Default)]
pub struct Metrics {
    /// Search requests normalized.
    pub requests_total: AtomicU64,
    /// Requests whose attribute list had comma-joined entries.
    pub attribute_lists_repaired: AtomicU64,
    /// Non-empty filters without a usable object class.
    pub filter_warnings: AtomicU64,
    /// Requests from anonymous (empty bind DN) clients.
    pub anonymous_requests: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_request(&self, anonymous: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if anonymous {
            self.anonymous_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn inc_attributes_repaired(&self) {
        self.attribute_lists_repaired.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_filter_warning(&self) {
        self.filter_warnings.fetch_add(1, Ordering::Relaxed);
    }

    /// Render in the Prometheus exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, help, value) in [
            (
                "ldap_search_requests_total",
                "Total number of search requests normalized.",
                self.requests_total.load(Ordering::Relaxed),
            ),
            (
                "ldap_search_anonymous_requests_total",
                "Search requests from anonymous binds.",
                self.anonymous_requests.load(Ordering::Relaxed),
            ),
            (
                "ldap_search_attribute_lists_repaired_total",
                "Search requests whose comma-joined attribute entries were split.",
                self.attribute_lists_repaired.load(Ordering::Relaxed),
            ),
            (
                "ldap_search_filter_warnings_total",
                "Search requests with a non-empty filter that failed to parse.",
                self.filter_warnings.load(Ordering::Relaxed),
            ),
        ] {
            out.push_str(&format!("# HELP {} {}\n", name, help));
            out.push_str(&format!("# TYPE {} counter\n", name));
            out.push_str(&format!("{} {}\n", name, value));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new_zero() {
        let m = Metrics::new();
        assert_eq!(m.requests_total.load(Ordering::Relaxed), 0);
        assert_eq!(m.filter_warnings.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_metrics_counters() {
        let m = Metrics::new();
        m.inc_request(false);
        m.inc_request(true);
        m.inc_attributes_repaired();
        m.inc_filter_warning();
        m.inc_filter_warning();
        assert_eq!(m.requests_total.load(Ordering::Relaxed), 2);
        assert_eq!(m.anonymous_requests.load(Ordering::Relaxed), 1);
        assert_eq!(m.attribute_lists_repaired.load(Ordering::Relaxed), 1);
        assert_eq!(m.filter_warnings.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_metrics_render() {
        let m = Metrics::new();
        m.inc_request(false);
        m.inc_filter_warning();
        let out = m.render();
        assert!(out.contains("# TYPE ldap_search_requests_total counter"));
        assert!(out.contains("ldap_search_requests_total 1\n"));
        assert!(out.contains("ldap_search_filter_warnings_total 1\n"));
        assert!(out.contains("ldap_search_attribute_lists_repaired_total 0\n"));
        assert!(out.contains(
            "# HELP ldap_search_filter_warnings_total Search requests with a non-empty filter that failed to parse.\n"
        ));
    }
}
