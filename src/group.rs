//! Cache Group - Read-Through Orchestrator
//!
//! A group is a named cache namespace. It answers `get` from its local cache,
//! and on a miss loads the key exactly once per in-flight epoch: from the peer
//! that owns it if one is registered, otherwise (or if that peer fails) from
//! the group's data source.
//!
//! # Request Flow
//!
//! ```text
//! get(key)
//!   │
//!   ├─ key empty ──────────────────────────────► Error::InvalidKey
//!   │
//!   ├─ CacheShard hit ─────────────────────────► ByteView
//!   │
//!   └─ SingleFlight::run(key)
//!        │
//!        ├─ PeerPicker::pick_peer ─► PeerGetter::fetch ─ ok ─► ByteView
//!        │                                             └ err ─┐ (logged)
//!        │                                                    ▼
//!        └─ DataSource::get ─ ok ─► CacheShard::add ─────► ByteView
//!                            └ err ──────────────────────► Error::DataSource
//! ```
//!
//! Values fetched from peers are not cached locally; the owning peer caches them.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::cache::{ByteView, CacheShard, CacheStats};
use crate::error::{Error, Result};
use crate::ports::{DataSource, PeerGetter, PeerPicker};
use crate::singleflight::{Role, SingleFlight};
use crate::stats::{GroupStats, GroupStatsSnapshot};

/// A named, read-through cache namespace
pub struct Group {
    name: String,
    source: Arc<dyn DataSource>,
    main_cache: CacheShard,
    peers: OnceCell<Arc<dyn PeerPicker>>,
    loader: SingleFlight<ByteView, Error>,
    stats: GroupStats,
}

impl Group {
    /// Create a group with a local cache budget of `cache_bytes` (0 = unbounded).
    ///
    /// Most programs create groups through a [`Registry`](crate::Registry) so
    /// that transports can find them by name.
    pub fn new(name: impl Into<String>, cache_bytes: u64, source: Arc<dyn DataSource>) -> Self {
        Self {
            name: name.into(),
            source,
            main_cache: CacheShard::new(cache_bytes),
            peers: OnceCell::new(),
            loader: SingleFlight::new(),
            stats: GroupStats::new(),
        }
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach the peer picker used to route misses.
    ///
    /// # Panics
    ///
    /// Panics if called more than once; wiring peers twice is a configuration bug.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) {
        if self.peers.set(peers).is_err() {
            panic!("register_peers called more than once for group {}", self.name);
        }
    }

    /// Whether a peer picker has been attached
    pub fn has_peers(&self) -> bool {
        self.peers.get().is_some()
    }

    /// Get the value for `key`
    #[instrument(skip(self), fields(group = %self.name))]
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        self.stats.record_get();

        if key.is_empty() {
            return Err(Error::InvalidKey);
        }

        if let Some(value) = self.main_cache.get(key) {
            self.stats.record_cache_hit();
            debug!("cache hit");
            return Ok(value);
        }

        self.load(key).await
    }

    async fn load(&self, key: &str) -> Result<ByteView> {
        self.stats.record_load();

        let (result, role) = self
            .loader
            .run_tracked(key, || async move {
                if let Some(peer) = self.peers.get().and_then(|p| p.pick_peer(key)) {
                    match self.get_from_peer(peer.as_ref(), key).await {
                        Ok(value) => {
                            self.stats.record_peer_load();
                            return Ok(value);
                        }
                        Err(err) => {
                            self.stats.record_peer_error();
                            warn!(error = %err, "failed to get from peer, loading locally");
                        }
                    }
                }
                self.get_locally(key).await
            })
            .await;

        if role == Role::Follower {
            self.stats.record_load_deduped();
        }
        result
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = match self.source.get(key).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.stats.record_local_load_err();
                return Err(match err {
                    Error::DataSource(_) => err,
                    other => Error::data_source(other),
                });
            }
        };

        // The source hands over ownership, so nothing outside the cache can
        // reach these bytes any more.
        let value = ByteView::from(bytes);
        self.stats.record_local_load();
        self.populate_cache(key, value.clone());
        Ok(value)
    }

    async fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let bytes = peer.fetch(&self.name, key).await?;
        Ok(ByteView::from(bytes))
    }

    fn populate_cache(&self, key: &str, value: ByteView) {
        self.main_cache.add(key, value);
    }

    /// Count a request that arrived from a peer through a transport
    pub fn record_server_request(&self) {
        self.stats.record_server_request();
    }

    /// Request counters
    pub fn stats(&self) -> GroupStatsSnapshot {
        self.stats.snapshot()
    }

    /// Local cache occupancy and hit counters
    pub fn cache_stats(&self) -> CacheStats {
        self.main_cache.stats()
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("cache_bytes", &self.main_cache.cache_bytes())
            .field("has_peers", &self.has_peers())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
