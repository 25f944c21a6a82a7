//! Local Cache Layer
//!
//! Byte-budgeted storage that backs each group on this node.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        CacheShard                            │
//! │   parking_lot::Mutex<Option<LruCache<ByteView>>>             │
//! ├──────────────────────────────────────────────────────────────┤
//! │                        LruCache                              │
//! │   HashMap<String, slot>  +  slab-linked recency list         │
//! │   head (MRU) ◄──► ... ◄──► tail (LRU)                        │
//! │   used_bytes = Σ key.len() + value.len()                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - Eviction is size-based, never count-based
//! - A budget of 0 means unbounded
//! - Values leave the cache as immutable [`ByteView`]s

mod byteview;
mod lru;
mod shard;

#[cfg(test)]
mod proptest;

pub use byteview::ByteView;
pub use lru::{EvictionCallback, LruCache, Weighted};
pub use shard::{CacheShard, CacheStats};

/// Cache budget used by the bundled node binary (2 KiB)
pub const DEFAULT_CACHE_BYTES: u64 = 2 << 10;
