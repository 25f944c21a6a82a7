//! HTTP Peer Transport
//!
//! One node's view of its peers over HTTP.
//!
//! # Wire Format
//!
//! ```text
//! GET {base_path}{urlencode(group)}/{urlencode(key)}
//!
//! 200  application/octet-stream   raw value bytes
//! 400  path does not have exactly two segments
//! 404  path outside base_path, or unknown group
//! 500  Group::get failed (body carries the error text)
//! 503  the registry this pool serves has been dropped
//! ```
//!
//! `HttpPool` is both the server half (answers peers from the local
//! [`Registry`]) and the [`PeerPicker`] (routes keys over a [`HashRing`] of
//! peer base URLs). `HttpGetter` is the client half.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::ports::{PeerGetter, PeerPicker};
use crate::registry::Registry;
use crate::ring::{HashRing, DEFAULT_REPLICAS};

/// Default URL prefix for peer requests
pub const DEFAULT_BASE_PATH: &str = "/_meshcache/";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for an HTTP pool
#[derive(Debug, Clone)]
pub struct HttpPoolConfig {
    /// URL prefix peers are served under; must start and end with '/'
    pub base_path: String,

    /// Virtual nodes per peer on the hash ring
    pub replicas: usize,

    /// Timeout for a single peer fetch
    pub request_timeout: Duration,
}

impl Default for HttpPoolConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpPoolConfig {
    fn validate(&self) -> Result<()> {
        if !self.base_path.starts_with('/') || !self.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "base path must start and end with '/': {}",
                self.base_path
            )));
        }
        if self.replicas == 0 {
            return Err(Error::Config("replicas must be at least 1".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// Client
// =============================================================================

/// Fetches values from one remote peer
pub struct HttpGetter {
    /// Peer address followed by the base path, e.g. `http://10.0.0.2:8001/_meshcache/`
    base_url: String,
    client: reqwest::Client,
}

impl HttpGetter {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, group: &str, key: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(group),
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl PeerGetter for HttpGetter {
    #[instrument(skip(self), fields(peer = %self.base_url))]
    async fn fetch(&self, group: &str, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(self.url(group, key))
            .send()
            .await
            .map_err(Error::peer_transport)?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::PeerTransport(format!(
                "server returned: {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| Error::PeerTransport(format!("reading response body: {}", e)))
    }
}

impl std::fmt::Debug for HttpGetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGetter")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// =============================================================================
// Pool
// =============================================================================

#[derive(Default)]
struct PoolState {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

/// HTTP server and peer picker for one node
pub struct HttpPool {
    /// This node's own base URL, e.g. `http://10.0.0.1:8001`
    self_addr: String,
    config: HttpPoolConfig,
    /// Held weakly: groups hold the pool as their peer picker
    registry: Weak<Registry>,
    client: reqwest::Client,
    /// Ring and per-peer clients; replaced wholesale by `set`
    state: Mutex<PoolState>,
}

impl HttpPool {
    /// Create a pool with default configuration.
    ///
    /// The pool does not keep `registry` alive; once the last `Arc` to it is
    /// dropped, peer requests are answered with 503.
    pub fn new(self_addr: impl Into<String>, registry: &Arc<Registry>) -> Result<Self> {
        Self::with_config(self_addr, registry, HttpPoolConfig::default())
    }

    /// Create a pool with custom configuration
    pub fn with_config(
        self_addr: impl Into<String>,
        registry: &Arc<Registry>,
        config: HttpPoolConfig,
    ) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            self_addr: self_addr.into(),
            config,
            registry: Arc::downgrade(registry),
            client,
            state: Mutex::new(PoolState::default()),
        })
    }

    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    pub fn config(&self) -> &HttpPoolConfig {
        &self.config
    }

    /// Replace the peer set. Peers are base URLs such as `http://10.0.0.2:8001`
    /// and should include this node's own `self_addr`.
    pub fn set<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let peers: Vec<String> = peers.into_iter().map(Into::into).collect();

        let mut ring = HashRing::new(self.config.replicas, None);
        ring.add(&peers);

        let getters = peers
            .iter()
            .map(|peer| {
                let getter = HttpGetter::new(
                    format!("{}{}", peer, self.config.base_path),
                    self.client.clone(),
                );
                (peer.clone(), Arc::new(getter))
            })
            .collect();

        *self.state.lock() = PoolState { ring, getters };
        info!(node = %self.self_addr, ?peers, "peer set updated");
    }

    /// Peers currently on the ring, sorted
    pub fn peers(&self) -> Vec<String> {
        let state = self.state.lock();
        state.ring.nodes().into_iter().map(str::to_string).collect()
    }

    /// Accept peer connections on `listener` until an accept error occurs
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        info!(
            node = %self.self_addr,
            local_addr = ?listener.local_addr().ok(),
            base_path = %self.config.base_path,
            "peer server listening"
        );

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let pool = Arc::clone(&self);

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let pool = Arc::clone(&pool);
                    async move { Ok::<_, Infallible>(pool.handle(req).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("peer connection error: {}", e);
                }
            });
        }
    }

    async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        debug!(node = %self.self_addr, method = %req.method(), path = %req.uri().path(), "peer request");
        self.respond(req.uri().path()).await
    }

    /// Answer a peer request for a (still percent-encoded) request path
    pub async fn respond(&self, path: &str) -> Response<Full<Bytes>> {
        let Some(rest) = path.strip_prefix(self.config.base_path.as_str()) else {
            warn!(path, "request outside base path");
            return text_response(StatusCode::NOT_FOUND, format!("unexpected path: {}", path));
        };

        let mut parts = rest.splitn(2, '/');
        let (Some(group_part), Some(key_part)) = (parts.next(), parts.next()) else {
            return text_response(StatusCode::BAD_REQUEST, "bad request".to_string());
        };

        let (Ok(group_name), Ok(key)) = (
            urlencoding::decode(group_part),
            urlencoding::decode(key_part),
        ) else {
            return text_response(StatusCode::BAD_REQUEST, "bad request".to_string());
        };

        let Some(registry) = self.registry.upgrade() else {
            return text_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "node is shutting down".to_string(),
            );
        };

        let Some(group) = registry.lookup(&group_name) else {
            return text_response(
                StatusCode::NOT_FOUND,
                Error::GroupNotFound(group_name.into_owned()).to_string(),
            );
        };

        group.record_server_request();
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
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.lock();
        let peer = state.ring.get(key)?;
        if peer == self.self_addr {
            return None;
        }

        debug!(node = %self.self_addr, peer, key, "picked peer");
        let getter = state.getters.get(peer)?;
        Some(Arc::clone(getter) as Arc<dyn PeerGetter>)
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_addr", &self.self_addr)
            .field("config", &self.config)
            .field("peers", &self.peers())
            .finish()
    }
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
