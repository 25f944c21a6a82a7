//! meshcache - Distributed Read-Through Cache
//!
//! An embeddable cache library: each process hosts named cache groups, each
//! group answers lookups from a bounded local LRU, and misses are loaded once
//! per key from either the peer that owns the key (by consistent hashing) or
//! the group's data source.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Registry                              │
//! │                 name ──▶ Arc<Group>  (RwLock)                    │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────▼─────────────────────────────────┐
//! │                              Group                               │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐ │
//! │  │  CacheShard  │   │ SingleFlight │   │  PeerPicker (opt.)   │ │
//! │  │  (LruCache)  │   │  (per key)   │   │  HttpPool + HashRing │ │
//! │  └──────────────┘   └──────┬───────┘   └──────────┬───────────┘ │
//! │                            │                      │             │
//! │                     ┌──────▼───────┐       ┌──────▼───────┐     │
//! │                     │  DataSource  │       │  PeerGetter  │     │
//! │                     └──────────────┘       └──────────────┘     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use meshcache::{DataSourceFn, Error, Registry, Result};
//!
//! # async fn demo() -> Result<()> {
//! let registry = Registry::new();
//! let scores = registry.create(
//!     "scores",
//!     2 << 10,
//!     DataSourceFn(|key: &str| -> Result<Vec<u8>> {
//!         match key {
//!             "Tom" => Ok(b"630".to_vec()),
//!             _ => Err(Error::data_source(format!("{} not exist", key))),
//!         }
//!     }),
//! );
//!
//! assert_eq!(scores.get("Tom").await?.to_string(), "630");
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Byte views, the LRU and the lock-guarded cache shard
//! - [`error`] - Error types
//! - [`exporter`] - Prometheus text exposition of group statistics
//! - [`group`] - The read-through orchestrator
//! - [`ports`] - Data source and peer traits
//! - [`registry`] - Group lookup by name
//! - [`ring`] - Consistent hash ring
//! - [`singleflight`] - Per-key call deduplication
//! - [`stats`] - Group counters
//! - [`transport`] - HTTP peer transport

pub mod cache;
pub mod error;
pub mod exporter;
pub mod group;
pub mod ports;
pub mod registry;
pub mod ring;
pub mod singleflight;
pub mod stats;
pub mod transport;

// Re-export commonly used types
pub use cache::{ByteView, CacheStats, DEFAULT_CACHE_BYTES};
pub use error::{Error, Result};
pub use group::Group;
pub use ports::{DataSource, DataSourceFn, PeerGetter, PeerPicker};
pub use registry::Registry;
pub use ring::HashRing;
pub use singleflight::SingleFlight;
pub use stats::GroupStatsSnapshot;
pub use transport::{HttpGetter, HttpPool, HttpPoolConfig};

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
