//! meshcache node
//!
//! Runs one cache node: a `scores` group backed by a small built-in table,
//! the peer server, and optionally a front-end API and a metrics endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          meshcache node                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │   API        │───▶│    Group     │◀───│  Peer server │◀── peers
//! │  │  /api?key=   │    │   "scores"   │    │  /_meshcache/│       │
//! │  └──────────────┘    └──────┬───────┘    └──────────────┘       │
//! │                             │ HttpPool (ring) ──────────────────▶ peers
//! │  ┌──────────────┐           ▼                                    │
//! │  │  /metrics    │    ┌──────────────┐                            │
//! │  └──────────────┘    │  ScoreTable  │                            │
//! │                      └──────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use meshcache::exporter::encode_metrics;
use meshcache::{DataSource, Error, Group, HttpPool, HttpPoolConfig, Registry, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// meshcache node - distributed read-through cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// This node's peer-facing base URL
    #[arg(long, env = "MESHCACHE_ADDR", default_value = "http://127.0.0.1:8001")]
    addr: String,

    /// Peer server bind address
    #[arg(long, env = "MESHCACHE_LISTEN", default_value = "127.0.0.1:8001")]
    listen: String,

    /// Peer base URLs, comma separated (this node is added if missing)
    #[arg(long, env = "MESHCACHE_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Local cache budget in bytes for the scores group (0 = unbounded)
    #[arg(long, env = "MESHCACHE_CACHE_BYTES", default_value = "2048")]
    cache_bytes: u64,

    /// Front-end API bind address
    #[arg(long, env = "MESHCACHE_API_LISTEN")]
    api_listen: Option<String>,

    /// Metrics server bind address
    #[arg(long, env = "MESHCACHE_METRICS_LISTEN")]
    metrics_listen: Option<String>,

    /// Peer request timeout in seconds
    #[arg(long, env = "MESHCACHE_PEER_TIMEOUT_SECONDS", default_value = "10")]
    peer_timeout_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MESHCACHE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "MESHCACHE_LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting meshcache node");
    info!("  Address: {}", args.addr);
    info!("  Listen: {}", args.listen);
    info!("  Cache bytes: {}", args.cache_bytes);

    let registry = Arc::new(Registry::new());
    let scores = registry.create("scores", args.cache_bytes, ScoreTable::demo());

    let config = HttpPoolConfig {
        request_timeout: Duration::from_secs(args.peer_timeout_seconds),
        ..Default::default()
    };
    let pool = Arc::new(HttpPool::with_config(
        args.addr.clone(),
        &registry,
        config,
    )?);

    let mut peers = args.peers.clone();
    if !peers.contains(&args.addr) {
        peers.push(args.addr.clone());
    }
    pool.set(peers);
    scores.register_peers(pool.clone());

    if let Some(addr) = args.api_listen.clone() {
        let group = Arc::clone(&scores);
        tokio::spawn(async move {
            let handler = move |req: Request<Incoming>| {
                let group = Arc::clone(&group);
                let uri = req.uri().clone();
                async move { api_response(&group, &uri).await }
            };
            if let Err(e) = run_http_server("API", &addr, handler).await {
                error!("API server error: {:#}", e);
            }
        });
    }

    if let Some(addr) = args.metrics_listen.clone() {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let handler = move |req: Request<Incoming>| {
                let registry = Arc::clone(&registry);
                let path = req.uri().path().to_string();
                async move { metrics_response(&registry, &path) }
            };
            if let Err(e) = run_http_server("Metrics", &addr, handler).await {
                error!("Metrics server error: {:#}", e);
            }
        });
    }

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to bind peer server on {}", args.listen))?;

    tokio::select! {
        result = pool.serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
    }

    info!("Node shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

// =============================================================================
// Data Source
// =============================================================================

/// Slow backing store stand-in: a fixed table of scores
struct ScoreTable {
    rows: HashMap<String, String>,
}

impl ScoreTable {
    fn demo() -> Self {
        let rows = [("Tom", "630"), ("Jack", "589"), ("Sam", "567")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { rows }
    }
}

#[async_trait]
impl DataSource for ScoreTable {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        info!(key, "loading from score table");
        self.rows
            .get(key)
            .map(|v| v.as_bytes().to_vec())
            .ok_or_else(|| Error::data_source(format!("{} not exist", key)))
    }
}

// =============================================================================
// HTTP Servers
// =============================================================================

async fn run_http_server<F, Fut>(name: &'static str, addr: &str, handler: F) -> anyhow::Result<()>
where
    F: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("Invalid {} server address: {}", name, addr))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {} server", name))?;

    info!("{} server listening on {}", name, addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .with_context(|| format!("{} server accept error", name))?;

        let io = TokioIo::new(stream);
        let handler = handler.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let response = handler(req);
                async move { Ok::<_, Infallible>(response.await) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("{} server connection error: {}", name, e);
            }
        });
    }
}

async fn api_response(group: &Group, uri: &Uri) -> Response<Full<Bytes>> {
    if uri.path() != "/api" {
        return text_response(StatusCode::NOT_FOUND, "not found".to_string());
    }

    let Some(key) = uri.query().and_then(query_key) else {
        return text_response(StatusCode::BAD_REQUEST, "missing key".to_string());
    };

    match group.get(&key).await {
        Ok(view) => {
            let mut response = Response::new(Full::new(view.to_bytes()));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            response
        }
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn metrics_response(registry: &Registry, path: &str) -> Response<Full<Bytes>> {
    if path != "/metrics" {
        return text_response(StatusCode::NOT_FOUND, "not found".to_string());
    }

    match encode_metrics(registry) {
        Ok((content_type, body)) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            response
        }
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Value of the `key` query parameter, percent-decoded
fn query_key(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == "key")
        .and_then(|(_, value)| {
            urlencoding::decode(&value.replace('+', " "))
                .ok()
                .map(Cow::into_owned)
        })
}

fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

// =============================================================================
// Tests
// =============================================================================
