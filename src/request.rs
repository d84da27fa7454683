use crate::config::Config;
use crate::connection::Connection;
use crate::ldap_protocol::SearchRequest;
use crate::metrics::Metrics;
use crate::normalize::{normalize_search, NormalizedSearch};
use crate::peer;
use crate::trace::{SearchSpan, SpanStart, TraceUser, Tracer, TracingTracer, DEFAULT_SPAN_OP};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::span::Id;
use tracing::{debug, warn, Span};
use uuid::Uuid;

/// Fields every log line of a search carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFields {
    pub bind_dn: String,
    pub base_dn: String,
    pub request_id: String,
    pub scope: &'static str,
    pub client: String,
    pub filter: String,
}

/// Structured log context of one search. Emit through [`LogContext::in_scope`]
/// (or enter [`LogContext::span`]) instead of repeating the fields by hand.
///
/// Its span is a root span that only follows from the search span, so it
/// stays usable after the search span is finished and never keeps it open.
#[derive(Debug, Clone)]
pub struct LogContext {
    fields: LogFields,
    span: Span,
}

impl LogContext {
    fn new(search_span: &Span, fields: LogFields) -> Self {
        let span = tracing::info_span!(
            parent: None,
            "ldap_request",
            bindDN = %fields.bind_dn,
            baseDN = %fields.base_dn,
            requestId = %fields.request_id,
            scope = %fields.scope,
            client = %fields.client,
            filter = %fields.filter,
        );
        span.follows_from(search_span);
        Self { fields, span }
    }

    pub fn fields(&self) -> &LogFields {
        &self.fields
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn in_scope<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.span.in_scope(f)
    }
}

/// Cancellation and trace context all work for a request is parented to.
///
/// The token is a child of the connection's close token, so a client
/// disconnect cancels it. When a deadline is set the token is cancelled once
/// it passes: by a timer task when built inside a tokio runtime, otherwise the
/// first time [`RequestContext::is_cancelled`] or [`RequestContext::cancelled`]
/// sees it expired.
///
/// Only the span id is kept; the [`SearchSpan`] returned by
/// [`Normalizer::construct`] is the one handle that keeps the span open.
#[derive(Debug, Clone)]
pub struct RequestContext {
    span_id: Option<Id>,
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    fn new(span: &Span, token: CancellationToken, deadline: Option<Instant>) -> Self {
        if let Some(deadline) = deadline {
            cancel_at(deadline, &token);
        }
        Self {
            span_id: span.id(),
            token,
            deadline,
        }
    }

    /// Parent for downstream spans. Only valid until the search span is
    /// finished; `None` when no subscriber is recording.
    pub fn span_id(&self) -> Option<Id> {
        self.span_id.clone()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Token for a downstream stage; cancelled together with this request.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.token.cancel();
        }
        self.token.is_cancelled()
    }

    /// Resolves once the request is cancelled, the connection closes or the deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => self.token.cancel(),
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

/// Cancel `token` at `deadline`. The timer task exits early if the token is
/// cancelled first. No-op outside a tokio runtime.
fn cancel_at(deadline: Instant, token: &CancellationToken) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        return;
    };
    let token = token.clone();
    handle.spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep_until(deadline) => token.cancel(),
        }
    });
}

/// A normalized search request. Built once per search operation and read-only afterwards.
///
/// Dropping it cancels its [`RequestContext`] token (and any child tokens).
pub struct Request {
    search: SearchRequest,
    bind_dn: String,
    filter_object_class: String,
    id: String,
    connection: Arc<dyn Connection>,
    context: RequestContext,
    log: LogContext,
    _cancel_on_drop: DropGuard,
}

impl Request {
    /// Search parameters with the attribute list already repaired.
    pub fn search(&self) -> &SearchRequest {
        &self.search
    }

    /// Lower-cased bind DN; empty for anonymous binds.
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    /// Lower-cased object class from the filter, empty when none could be determined.
    pub fn filter_object_class(&self) -> &str {
        &self.filter_object_class
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn log(&self) -> &LogContext {
        &self.log
    }

    /// Client IP (no port), derived the same way as at construction.
    pub fn remote_addr(&self) -> String {
        peer::client_ip(&self.connection.remote_addr())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("bind_dn", &self.bind_dn)
            .field("filter_object_class", &self.filter_object_class)
            .field("search", &self.search)
            .field("remote_addr", &self.connection.remote_addr())
            .finish()
    }
}

/// Turns decoded search requests into [`Request`]s.
///
/// Holds no per-request state and can be shared between connection tasks.
#[derive(Clone)]
pub struct Normalizer {
    tracer: Arc<dyn Tracer>,
    metrics: Option<Arc<Metrics>>,
    span_op: String,
    search_timeout: Option<Duration>,
}

impl Normalizer {
    pub fn new(tracer: Arc<dyn Tracer>) -> Self {
        Self {
            tracer,
            metrics: None,
            span_op: DEFAULT_SPAN_OP.to_string(),
            search_timeout: None,
        }
    }

    /// Normalizer with the default `tracing` backed tracer and configured span op / timeout.
    pub fn from_config(config: &Config) -> Self {
        let normalizer = Self::new(Arc::new(TracingTracer)).with_span_op(config.tracing.span_op.clone());
        match config.search.timeout() {
            Some(timeout) => normalizer.with_search_timeout(timeout),
            None => normalizer,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_span_op(mut self, span_op: impl Into<String>) -> Self {
        self.span_op = span_op.into();
        self
    }

    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = Some(timeout);
        self
    }

    /// Build the request for one search operation.
    ///
    /// Never fails: a filter without a usable object class only produces a
    /// warning and an empty [`Request::filter_object_class`]. The returned span
    /// must be finished by the caller when the operation completes.
    pub fn construct(
        &self,
        bind_dn: &str,
        raw: &SearchRequest,
        conn: Arc<dyn Connection>,
    ) -> (Request, SearchSpan) {
        let rid = Uuid::new_v4().to_string();
        let anonymous = bind_dn.is_empty();
        let NormalizedSearch {
            bind_dn,
            search,
            object_class,
            attributes_repaired,
        } = normalize_search(bind_dn, raw);
        let scope = search.scope.name();
        let client = peer::client_ip(&conn.remote_addr());

        let span = self.tracer.start_span(&SpanStart {
            op: &self.span_op,
            description: format!("{} ({})", search.base_object, scope),
            request_uid: &rid,
            filter: &search.filter,
            base_dn: &search.base_object,
        });
        self.tracer.set_user(
            &span,
            &TraceUser {
                username: bind_dn.clone(),
                id: bind_dn.clone(),
                ip_address: client.clone(),
            },
        );

        let log = LogContext::new(
            &span,
            LogFields {
                bind_dn: bind_dn.clone(),
                base_dn: search.base_object.clone(),
                request_id: rid.clone(),
                scope,
                client,
                filter: search.filter.clone(),
            },
        );

        let (filter_object_class, filter_error) = match object_class {
            Ok(oc) => (oc, None),
            Err(e) => (String::new(), Some(e)),
        };
        // An empty filter never names an object class; nothing to report.
        if let Some(e) = filter_error.filter(|_| !search.filter.is_empty()) {
            log.in_scope(|| {
                warn!(error = %e, objectClass = %filter_object_class, "invalid filter object class");
            });
            if let Some(m) = &self.metrics {
                m.inc_filter_warning();
            }
        }

        if attributes_repaired {
            log.in_scope(|| {
                debug!(attributes = ?search.attributes, "split comma-separated attributes");
            });
            if let Some(m) = &self.metrics {
                m.inc_attributes_repaired();
            }
        }
        if let Some(m) = &self.metrics {
            m.inc_request(anonymous);
        }

        let context = RequestContext::new(
            &span,
            conn.close_token().child_token(),
            self.search_timeout.map(|t| Instant::now() + t),
        );
        let cancel_on_drop = context.token.clone().drop_guard();

        let request = Request {
            search,
            bind_dn,
            filter_object_class,
            id: rid,
            connection: conn,
            context,
            log,
            _cancel_on_drop: cancel_on_drop,
        };
        (request, SearchSpan::new(span))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(TracingTracer))
    }
}
