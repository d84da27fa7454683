pub mod config;
pub mod connection;
pub mod filter;
pub mod ldap_protocol;
pub mod metrics;
pub mod normalize;
pub mod peer;
pub mod request;
pub mod trace;

pub use config::Config;
pub use connection::{ClientConnection, Connection};
pub use ldap_protocol::{SearchRequest, SearchScope};
pub use metrics::Metrics;
pub use normalize::normalize_attributes;
pub use request::{LogContext, Normalizer, Request, RequestContext};
pub use trace::{SearchSpan, TraceUser, Tracer, TracingTracer};
