//! Trace spans for search operations.
//!
//! The normalizer does not reach for process-wide tracing state on its own: it
//! is handed a [`Tracer`] when the server is wired together. [`TracingTracer`]
//! is the default and records everything on `tracing` spans, which the
//! installed subscriber exports.

use std::time::{Duration, Instant};
use tracing::field::Empty;
use tracing::{debug, Span};

/// Operation name of search spans unless configured otherwise.
pub const DEFAULT_SPAN_OP: &str = "ldap.search";

/// Identity attached to a span: who is searching and from where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceUser {
    pub username: String,
    pub id: String,
    pub ip_address: String,
}

/// Everything a search span is started with.
#[derive(Debug, Clone)]
pub struct SpanStart<'a> {
    pub op: &'a str,
    pub description: String,
    pub request_uid: &'a str,
    pub filter: &'a str,
    pub base_dn: &'a str,
}

pub trait Tracer: Send + Sync {
    /// Start a span tagged with the request id, filter and base DN.
    fn start_span(&self, start: &SpanStart<'_>) -> Span;

    fn set_user(&self, span: &Span, user: &TraceUser);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn start_span(&self, start: &SpanStart<'_>) -> Span {
        tracing::info_span!(
            "ldap_search",
            otel.name = %start.op,
            description = %start.description,
            request_uid = %start.request_uid,
            ldap_filter = %start.filter,
            ldap_base_dn = %start.base_dn,
            user.username = Empty,
            user.id = Empty,
            user.ip_address = Empty,
        )
    }

    fn set_user(&self, span: &Span, user: &TraceUser) {
        span.record("user.username", user.username.as_str());
        span.record("user.id", user.id.as_str());
        span.record("user.ip_address", user.ip_address.as_str());
    }
}

/// Handle on a started search span. The owner of the operation ends it with
/// [`SearchSpan::finish`]; dropping the handle ends it too, so early returns
/// and panics do not leak open spans.
#[must_use = "the search span must be finished when the operation completes"]
#[derive(Debug)]
pub struct SearchSpan {
    span: Span,
    started: Instant,
    finished: bool,
}

impl SearchSpan {
    pub fn new(span: Span) -> Self {
        Self {
            span,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn finish(mut self) -> Duration {
        self.end()
    }

    fn end(&mut self) -> Duration {
        let elapsed = self.elapsed();
        if !self.finished {
            self.finished = true;
            self.span.in_scope(|| {
                debug!(elapsed_us = elapsed.as_micros() as u64, "search span finished");
            });
        }
        elapsed
    }
}

impl Drop for SearchSpan {
    fn drop(&mut self) {
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start<'a>(uid: &'a str) -> SpanStart<'a> {
        SpanStart {
            op: DEFAULT_SPAN_OP,
            description: "dc=example,dc=com (Whole Subtree)".to_string(),
            request_uid: uid,
            filter: "(uid=bob)",
            base_dn: "dc=example,dc=com",
        }
    }

    #[test]
    fn test_tracing_tracer_without_subscriber() {
        let tracer = TracingTracer;
        let span = tracer.start_span(&start("abc"));
        tracer.set_user(
            &span,
            &TraceUser {
                username: "cn=bob".to_string(),
                id: "cn=bob".to_string(),
                ip_address: "127.0.0.1".to_string(),
            },
        );
        let guard = SearchSpan::new(span);
        assert!(!guard.is_finished());
        guard.finish();
    }

    #[test]
    fn test_tracing_tracer_with_subscriber() {
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        tracing::subscriber::with_default(subscriber, || {
            let span = TracingTracer.start_span(&start("abc"));
            assert!(!span.is_disabled());
            assert_eq!(span.metadata().map(|m| m.name()), Some("ldap_search"));
            let guard = SearchSpan::new(span);
            let elapsed = guard.finish();
            assert!(elapsed >= Duration::ZERO);
        });
    }

    #[test]
    fn test_search_span_ends_on_drop() {
        let guard = SearchSpan::new(Span::none());
        drop(guard);
    }
}
