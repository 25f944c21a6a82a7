//! Concurrent Cache Shard
//!
//! Thread-safe wrapper around [`LruCache`] used as a group's local cache.
//!
//! # Design
//!
//! - One exclusive `parking_lot::Mutex` covers both `get` and `add`, since a
//!   hit reorders the recency list
//! - The inner cache is built lazily on the first `add`; a shard that was
//!   never written to answers every `get` with a miss
//! - Hit/miss/eviction counters live outside the lock

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::byteview::ByteView;
use super::lru::LruCache;

/// Local cache for one group
pub struct CacheShard {
    /// Byte budget handed to the inner cache when it is built
    cache_bytes: u64,
    lru: Mutex<Option<LruCache<ByteView>>>,
    /// Number of lookups
    gets: AtomicU64,
    /// Number of lookups that found a value
    hits: AtomicU64,
    /// Number of entries evicted by the budget
    evictions: Arc<AtomicU64>,
}

impl CacheShard {
    /// Create a shard with a byte budget (0 = unbounded)
    pub fn new(cache_bytes: u64) -> Self {
        Self {
            cache_bytes,
            lru: Mutex::new(None),
            gets: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            evictions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Look up a value, promoting it on a hit
    pub fn get(&self, key: &str) -> Option<ByteView> {
        self.gets.fetch_add(1, Ordering::Relaxed);

        let value = {
            let mut guard = self.lru.lock();
            guard.as_mut()?.get(key).cloned()
        };

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Insert or replace a value, evicting as needed
    pub fn add(&self, key: &str, value: ByteView) {
        let mut guard = self.lru.lock();
        let lru = guard.get_or_insert_with(|| {
            let evictions = Arc::clone(&self.evictions);
            LruCache::with_eviction_callback(self.cache_bytes, move |_, _| {
                evictions.fetch_add(1, Ordering::Relaxed);
            })
        });
        lru.add(key, value);
    }

    /// Byte budget of this shard
    pub fn cache_bytes(&self) -> u64 {
        self.cache_bytes
    }

    /// True until the first `add` builds the inner cache
    pub fn is_unallocated(&self) -> bool {
        self.lru.lock().is_none()
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.lru.lock().as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the shard's counters and occupancy
    pub fn stats(&self) -> CacheStats {
        let (bytes, items) = {
            let guard = self.lru.lock();
            guard
                .as_ref()
                .map_or((0, 0), |lru| (lru.used_bytes(), lru.len() as u64))
        };

        CacheStats {
            bytes,
            items,
            gets: self.gets.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for CacheShard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheShard")
            .field("cache_bytes", &self.cache_bytes)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Point-in-time statistics for a cache shard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Bytes charged by resident entries
    pub bytes: u64,
    /// Resident entries
    pub items: u64,
    /// Lookups
    pub gets: u64,
    /// Lookups that hit
    pub hits: u64,
    /// Entries evicted by the byte budget
    pub evictions: u64,
}

impl CacheStats {
    /// Get hit ratio
    pub fn hit_ratio(&self) -> f64 {
        if self.gets == 0 {
            0.0
        } else {
            self.hits as f64 / self.gets as f64
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
