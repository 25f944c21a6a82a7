//! Consistent Hash Ring
//!
//! Maps keys to a fixed set of nodes. Each node is placed on the ring
//! `replicas` times (virtual nodes) so that a handful of physical nodes still
//! split the key space evenly.
//!
//! # Design
//!
//! - Virtual node `i` of `node` sits at `hash(format!("{i}{node}"))`
//! - A key belongs to the first virtual node clockwise from `hash(key)`,
//!   wrapping to the start of the ring
//! - Default hash is CRC-32/IEEE
//! - Nodes can be added in batches; there is no removal

use std::collections::HashMap;

/// Hash function used to place nodes and keys on the ring
pub type HashFn = fn(&[u8]) -> u32;

/// Default number of virtual nodes per physical node
pub const DEFAULT_REPLICAS: usize = 50;

/// Consistent hash ring with virtual nodes
#[derive(Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Sorted virtual node positions
    hashes: Vec<u32>,
    /// Virtual node position -> physical node
    nodes: HashMap<u32, String>,
}

impl HashRing {
    /// Create an empty ring. `hash` defaults to CRC-32/IEEE.
    pub fn new(replicas: usize, hash: Option<HashFn>) -> Self {
        Self {
            hash: hash.unwrap_or(crc32fast::hash),
            replicas,
            hashes: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    /// Add a batch of nodes to the ring
    pub fn add<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for node in nodes {
            let node = node.as_ref();
            for i in 0..self.replicas {
                let hash = (self.hash)(format!("{}{}", i, node).as_bytes());
                self.hashes.push(hash);
                self.nodes.insert(hash, node.to_string());
            }
        }
        self.hashes.sort_unstable();
    }

    /// Node owning `key`, or `None` if the ring is empty
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.hashes.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.hashes.partition_point(|&h| h < hash);
        let position = self.hashes[idx % self.hashes.len()];
        self.nodes.get(&position).map(String::as_str)
    }

    /// Number of virtual nodes on the ring
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Virtual nodes per physical node
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Distinct physical nodes, sorted
    pub fn nodes(&self) -> Vec<&str> {
        let mut nodes: Vec<&str> = self.nodes.values().map(String::as_str).collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS, None)
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("points", &self.hashes.len())
            .field("nodes", &self.nodes())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
