use clap::Parser;
use ldap_search_request::{ClientConnection, Config, Metrics, Normalizer, SearchRequest, SearchScope};
use ldap_search_request::peer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use anyhow::{Context, Result};

#[derive(Parser)]
#[command(name = "ldap-search-request")]
#[command(about = "Normalize an LDAP search request the way the proxy does before executing it")]
struct Args {
    /// Configuration file path (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// DN the client is bound as; empty for anonymous
    #[arg(long, value_name = "DN", default_value = "")]
    bind_dn: String,

    /// Search base
    #[arg(short, long, value_name = "DN")]
    base_dn: String,

    /// Search scope: base, one, sub (or the wire value 0, 1, 2)
    #[arg(short, long, default_value = "sub", value_parser = SearchScope::from_short_name)]
    scope: SearchScope,

    /// Filter in RFC 4515 string form
    #[arg(short, long, default_value = "(objectClass=*)")]
    filter: String,

    /// Requested attribute; repeat or comma-join
    #[arg(short, long = "attribute", value_name = "ATTR")]
    attributes: Vec<String>,

    /// Client peer address the request came from
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:389")]
    peer: SocketAddr,

    /// Size limit (0 = none)
    #[arg(long, default_value_t = 0)]
    size_limit: i32,

    /// Time limit in seconds (0 = none)
    #[arg(long, default_value_t = 0)]
    time_limit: i32,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter(args.debug))
        .init();

    let metrics = Arc::new(Metrics::new());
    let normalizer = Normalizer::from_config(&config).with_metrics(Arc::clone(&metrics));

    let raw = SearchRequest::new(args.base_dn, args.scope, args.filter)
        .with_attributes(args.attributes)
        .with_limits(args.size_limit, args.time_limit);
    let conn = Arc::new(ClientConnection::new(args.peer));
    info!("Normalizing search from {}", peer::client_ip(&args.peer));

    let (request, span) = normalizer.construct(&args.bind_dn, &raw, conn.clone());
    request.log().in_scope(|| {
        info!(
            object_class = %request.filter_object_class(),
            attributes = ?request.search().attributes,
            "search request normalized"
        );
    });

    println!("request id:    {}", request.id());
    println!("bind dn:       {}", request.bind_dn());
    println!("base dn:       {}", request.search().base_object);
    println!("scope:         {}", request.search().scope);
    println!("client:        {}", request.remote_addr());
    println!("filter:        {}", request.search().filter);
    println!("object class:  {}", request.filter_object_class());
    println!("attributes:    {:?}", request.search().attributes);
    if let Some(deadline) = request.context().deadline() {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        println!("deadline in:   {:?}", remaining);
    }

    conn.close();
    let elapsed = span.finish();
    info!("Request {} finished in {:?}", request.id(), elapsed);

    print!("{}", metrics.render());
    Ok(())
}
