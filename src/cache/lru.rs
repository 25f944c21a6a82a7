//! Byte-Budgeted LRU Cache
//!
//! Single-threaded least-recently-used cache whose budget is measured in bytes
//! rather than entries. Each entry is charged `key.len() + value.weight()`.
//!
//! # Design
//!
//! - Recency list stored as an index-linked slab (no unsafe pointers)
//! - `HashMap<String, usize>` from key to slab slot
//! - Front of the list is most recently used, back is least recently used
//! - `max_bytes == 0` disables eviction entirely
//!
//! Not synchronized; use [`CacheShard`](super::CacheShard) for shared access.

use std::collections::HashMap;
use std::fmt;

/// Values stored in an [`LruCache`] report how many bytes they occupy
pub trait Weighted {
    /// Size charged against the cache budget, in bytes
    fn weight(&self) -> usize;
}

impl Weighted for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for bytes::Bytes {
    fn weight(&self) -> usize {
        self.len()
    }
}

/// Callback invoked with each entry the cache evicts
pub type EvictionCallback<V> = Box<dyn FnMut(String, V) + Send>;

struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Byte-budgeted LRU cache
pub struct LruCache<V> {
    /// Budget in bytes (0 = unbounded)
    max_bytes: u64,
    /// Bytes charged by resident entries
    used_bytes: u64,
    /// Slab of list nodes; `None` marks a free slot
    nodes: Vec<Option<Node<V>>>,
    /// Free slots available for reuse
    free: Vec<usize>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
    index: HashMap<String, usize>,
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V: Weighted> LruCache<V> {
    /// Create a cache with the given byte budget and no eviction callback
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            index: HashMap::new(),
            on_evicted: None,
        }
    }

    /// Create a cache that reports every evicted entry to `on_evicted`
    pub fn with_eviction_callback<F>(max_bytes: u64, on_evicted: F) -> Self
    where
        F: FnMut(String, V) + Send + 'static,
    {
        let mut cache = Self::new(max_bytes);
        cache.on_evicted = Some(Box::new(on_evicted));
        cache
    }

    /// Look up a key, promoting it to most recently used on a hit
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.move_to_front(idx);
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Look up a key without touching recency order
    pub fn peek(&self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Check if a key is resident
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or replace a value, then evict until the budget holds
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(&idx) = self.index.get(&key) {
            let new_weight = value.weight() as u64;
            if let Some(node) = self.nodes[idx].as_mut() {
                let old_weight = node.value.weight() as u64;
                node.value = value;
                self.used_bytes = self.used_bytes - old_weight + new_weight;
            }
            self.move_to_front(idx);
        } else {
            self.used_bytes += (key.len() + value.weight()) as u64;
            let idx = self.alloc(Node {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.push_front(idx);
            self.index.insert(key, idx);
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if !self.remove_oldest() {
                break;
            }
        }
    }

    /// Evict the least recently used entry. Returns false if the cache was empty.
    pub fn remove_oldest(&mut self) -> bool {
        let Some(idx) = self.tail else {
            return false;
        };

        self.unlink(idx);
        let node = self.release(idx);
        self.index.remove(&node.key);
        self.used_bytes -= (node.key.len() + node.value.weight()) as u64;

        if let Some(on_evicted) = self.on_evicted.as_mut() {
            on_evicted(node.key, node.value);
        }
        true
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes currently charged against the budget
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let Some(node) = self.nodes[idx].as_ref() else {
                break;
            };
            keys.push(node.key.clone());
            cursor = node.next;
        }
        keys
    }

    // =========================================================================
    // List plumbing
    // =========================================================================

    fn alloc(&mut self, node: Node<V>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Node<V> {
        self.free.push(idx);
        self.nodes[idx]
            .take()
            .unwrap_or_else(|| unreachable!("released an empty slab slot"))
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.nodes[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.nodes[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.nodes[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.nodes[h].as_mut() {
                node.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }
}

impl<V> fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("max_bytes", &self.max_bytes)
            .field("used_bytes", &self.used_bytes)
            .field("len", &self.index.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
