//! Group Statistics
//!
//! Lock-free counters describing how a group served its requests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one group
#[derive(Debug, Default)]
pub struct GroupStats {
    /// Any `get` request, including from peers
    gets: AtomicU64,
    /// Served from the local cache
    cache_hits: AtomicU64,
    /// Remote loads that succeeded
    peer_loads: AtomicU64,
    /// Remote loads that failed and fell back to the data source
    peer_errors: AtomicU64,
    /// Cache misses routed through single-flight
    loads: AtomicU64,
    /// Misses that waited on another caller's load
    loads_deduped: AtomicU64,
    /// Successful data source loads
    local_loads: AtomicU64,
    /// Failed data source loads
    local_load_errs: AtomicU64,
    /// Requests received from peers over a transport
    server_requests: AtomicU64,
}

impl GroupStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_deduped(&self) {
        self.loads_deduped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load_err(&self) {
        self.local_load_errs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_server_request(&self) {
        self.server_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> GroupStatsSnapshot {
        GroupStatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            loads_deduped: self.loads_deduped.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            local_load_errs: self.local_load_errs.load(Ordering::Relaxed),
            server_requests: self.server_requests.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`GroupStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStatsSnapshot {
    pub gets: u64,
    pub cache_hits: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub loads: u64,
    pub loads_deduped: u64,
    pub local_loads: u64,
    pub local_load_errs: u64,
    pub server_requests: u64,
}

impl GroupStatsSnapshot {
    /// Counter names and values, in a stable order, for exporters
    pub fn counters(&self) -> [(&'static str, u64); 9] {
        [
            ("gets", self.gets),
            ("cache_hits", self.cache_hits),
            ("peer_loads", self.peer_loads),
            ("peer_errors", self.peer_errors),
            ("loads", self.loads),
            ("loads_deduped", self.loads_deduped),
            ("local_loads", self.local_loads),
            ("local_load_errs", self.local_load_errs),
            ("server_requests", self.server_requests),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_records() {
        let stats = GroupStats::new();
        stats.record_get();
        stats.record_get();
        stats.record_cache_hit();
        stats.record_peer_error();
        stats.record_server_request();

        let snap = stats.snapshot();
        assert_eq!(snap.gets, 2);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.peer_errors, 1);
        assert_eq!(snap.server_requests, 1);
        assert_eq!(snap.local_loads, 0);
    }

    #[test]
    fn test_counters_order() {
        let snap = GroupStatsSnapshot {
            gets: 7,
            ..Default::default()
        };
        let counters = snap.counters();
        assert_eq!(counters[0], ("gets", 7));
        assert_eq!(counters[8].0, "server_requests");
    }
}
