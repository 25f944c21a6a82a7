//! Property-Based Tests for the LRU Cache
//!
//! # Test Properties
//!
//! 1. **Budget**: after every `add`, `used_bytes <= max_bytes`
//! 2. **Accounting**: `used_bytes` equals the sum of resident entry sizes
//! 3. **Callback**: every entry that leaves the cache is reported exactly once

#![cfg(test)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use super::lru::LruCache;

/// Strategy for a sequence of (key, value) insertions drawn from a small key
/// space so that updates of existing keys are common.
fn ops_strategy() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
    prop::collection::vec(
        ("[a-h]{1,3}", prop::collection::vec(any::<u8>(), 0..40)),
        1..200,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the byte budget holds and accounting is exact after every add.
    #[test]
    fn prop_budget_and_accounting(
        max_bytes in 1u64..256,
        ops in ops_strategy(),
    ) {
        let mut lru: LruCache<Vec<u8>> = LruCache::new(max_bytes);
        // Shadow copy of the latest value written per key.
        let mut latest: HashMap<String, Vec<u8>> = HashMap::new();

        for (key, value) in ops {
            latest.insert(key.clone(), value.clone());
            lru.add(key, value);

            prop_assert!(lru.used_bytes() <= max_bytes);

            let resident: u64 = lru
                .keys()
                .iter()
                .map(|k| {
                    let v = lru.peek(k).map_or(0, Vec::len);
                    (k.len() + v) as u64
                })
                .sum();
            prop_assert_eq!(lru.used_bytes(), resident);
            prop_assert_eq!(lru.keys().len(), lru.len());

            for k in lru.keys() {
                prop_assert_eq!(lru.peek(&k), latest.get(&k));
            }
        }
    }

    /// Property: evicted keys are reported once and are no longer resident.
    #[test]
    fn prop_eviction_callback_matches_departures(
        max_bytes in 1u64..128,
        ops in ops_strategy(),
    ) {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let mut lru = LruCache::with_eviction_callback(max_bytes, move |key, value: Vec<u8>| {
            sink.lock().unwrap().push((key, value));
        });

        let mut inserted = 0usize;
        let mut seen = std::collections::HashSet::new();
        for (key, value) in ops {
            let before = evicted.lock().unwrap().len();
            let was_resident = lru.contains(&key);
            if !was_resident {
                inserted += 1;
            }
            seen.insert(key.clone());
            lru.add(key, value);

            for (k, _) in evicted.lock().unwrap()[before..].iter() {
                prop_assert!(!lru.contains(k));
            }
        }

        // Every insertion of a non-resident key either is still resident or
        // was reported exactly once.
        let reports = evicted.lock().unwrap().len();
        prop_assert_eq!(inserted, reports + lru.len());
        prop_assert!(lru.len() <= seen.len());
    }

    /// Property: an unbounded cache keeps every distinct key.
    #[test]
    fn prop_unbounded_keeps_everything(ops in ops_strategy()) {
        let mut lru: LruCache<Vec<u8>> = LruCache::new(0);
        let mut distinct = std::collections::HashSet::new();
        for (key, value) in ops {
            distinct.insert(key.clone());
            lru.add(key, value);
        }
        prop_assert_eq!(lru.len(), distinct.len());
    }
}
