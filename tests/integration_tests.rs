//! meshcache Integration Tests
//!
//! End-to-end flows through the public API:
//! - Read-through groups behind a registry
//! - HTTP peer transport against real servers on ephemeral ports
//! - Multi-node routing, dedup and fallback

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

use meshcache::{
    DataSource, DataSourceFn, Error, Group, HashRing, HttpGetter, HttpPool, PeerGetter, Registry,
    Result,
};

/// Answers `"{node}:{key}"` for keys without a '!' and counts calls.
struct NodeSource {
    node: String,
    calls: AtomicUsize,
    delay: Duration,
}

impl NodeSource {
    fn new(node: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            node: node.to_string(),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for NodeSource {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if key.contains('!') {
            return Err(Error::data_source(format!("{} not exist", key)));
        }
        Ok(format!("{}:{}", self.node, key).into_bytes())
    }
}

// =============================================================================
// Read-Through Group Tests
// =============================================================================

mod group_tests {
    use super::*;

    #[tokio::test]
    async fn test_reversed_key_loaded_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = Registry::new();
        registry.create(
            "scores",
            2 << 10,
            DataSourceFn(move |key: &str| -> Result<Vec<u8>> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(key.bytes().rev().collect())
            }),
        );

        let group = registry.lookup("scores").unwrap();
        let first = assert_ok!(group.get("abc").await);
        let second = assert_ok!(group.get("abc").await);

        assert_eq!(first.as_slice(), b"cba");
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_key_never_reaches_source() {
        let source = NodeSource::new("a", Duration::ZERO);
        let group = Group::new("scores", 2 << 10, source.clone());

        assert_matches!(group.get("").await, Err(Error::InvalidKey));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_load() {
        let source = NodeSource::new("a", Duration::from_millis(100));
        let group = Arc::new(Group::new("scores", 2 << 10, source.clone()));

        let gets = (0..16).map(|_| {
            let group = Arc::clone(&group);
            async move { group.get("Tom").await }
        });
        let results = futures::future::join_all(gets).await;

        assert_eq!(source.calls(), 1);
        for result in results {
            assert_eq!(assert_ok!(result).to_string(), "a:Tom");
        }
    }
}

// =============================================================================
// HTTP Transport Tests
// =============================================================================

struct Node {
    url: String,
    _registry: Arc<Registry>,
    source: Arc<NodeSource>,
    group: Arc<Group>,
    pool: Arc<HttpPool>,
}

async fn start_node(name: &str, delay: Duration) -> Node {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let registry = Arc::new(Registry::new());
    let source = NodeSource::new(name, delay);
    let group = registry.create_with_source("scores", 2 << 10, source.clone());
    let pool = Arc::new(HttpPool::new(url.clone(), &registry).unwrap());

    tokio::spawn(Arc::clone(&pool).serve(listener));

    Node {
        url,
        _registry: registry,
        source,
        group,
        pool,
    }
}

/// First `key-{i}` that the ring over `peers` assigns to `owner`
fn key_owned_by(peers: &[&str], owner: &str) -> String {
    first_owned(peers, owner, |i| format!("key-{}", i))
}

/// Like [`key_owned_by`], for a key the data sources reject
fn missing_key_owned_by(peers: &[&str], owner: &str) -> String {
    first_owned(peers, owner, |i| format!("missing-{}!", i))
}

fn first_owned(peers: &[&str], owner: &str, make_key: fn(usize) -> String) -> String {
    let mut ring = HashRing::new(meshcache::ring::DEFAULT_REPLICAS, None);
    ring.add(peers);
    (0..)
        .map(make_key)
        .find(|key| ring.get(key) == Some(owner))
        .unwrap()
}

mod http_tests {
    use super::*;

    fn getter(node: &Node) -> HttpGetter {
        HttpGetter::new(format!("{}/_meshcache/", node.url), reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_getter_fetches_value() {
        let node = start_node("a", Duration::ZERO).await;

        let value = assert_ok!(getter(&node).fetch("scores", "Tom").await);
        assert_eq!(&value[..], b"a:Tom");
        assert_eq!(node.group.stats().server_requests, 1);
    }

    #[tokio::test]
    async fn test_getter_escapes_keys() {
        let node = start_node("a", Duration::ZERO).await;

        let value = assert_ok!(getter(&node).fetch("scores", "a/b c?d").await);
        assert_eq!(&value[..], b"a:a/b c?d");
    }

    #[tokio::test]
    async fn test_non_200_is_peer_transport_error() {
        let node = start_node("a", Duration::ZERO).await;
        let getter = getter(&node);

        let err = assert_err!(getter.fetch("users", "Tom").await);
        assert_matches!(err, Error::PeerTransport(msg) if msg.contains("404"));

        let err = assert_err!(getter.fetch("scores", "Kate!").await);
        assert_matches!(err, Error::PeerTransport(msg) if msg.contains("500"));
    }

    #[tokio::test]
    async fn test_server_status_codes() {
        let node = start_node("a", Duration::ZERO).await;
        let client = reqwest::Client::new();

        let status = |path: &'static str| {
            let client = client.clone();
            let url = format!("{}{}", node.url, path);
            async move { client.get(url).send().await.unwrap().status().as_u16() }
        };

        assert_eq!(status("/_meshcache/scores/Tom").await, 200);
        assert_eq!(status("/_meshcache/scores").await, 400);
        assert_eq!(status("/_meshcache/users/Tom").await, 404);
        assert_eq!(status("/_meshcache/scores/Kate!").await, 500);
        assert_eq!(status("/other/scores/Tom").await, 404);

        let response = client
            .get(format!("{}/_meshcache/scores/Jack", node.url))
            .send()
            .await
            .unwrap();
        assert_eq!(
            response.headers()["content-type"],
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_peer_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let getter = HttpGetter::new(format!("http://{}/_meshcache/", addr), reqwest::Client::new());
        let err = assert_err!(getter.fetch("scores", "Tom").await);
        assert!(err.is_peer_failure());
    }
}

// =============================================================================
// Multi-Node Tests
// =============================================================================

mod cluster_tests {
    use super::*;

    async fn two_nodes(delay: Duration) -> (Node, Node) {
        let a = start_node("a", Duration::ZERO).await;
        let b = start_node("b", delay).await;

        let peers = [a.url.clone(), b.url.clone()];
        for node in [&a, &b] {
            node.pool.set(peers.clone());
            node.group.register_peers(node.pool.clone());
        }
        (a, b)
    }

    #[tokio::test]
    async fn test_remote_key_loaded_by_owner() {
        let (a, b) = two_nodes(Duration::ZERO).await;
        let key = key_owned_by(&[&a.url, &b.url], &b.url);

        let value = assert_ok!(a.group.get(&key).await);
        assert_eq!(value.to_string(), format!("b:{}", key));
        assert_eq!(a.source.calls(), 0);
        assert_eq!(b.source.calls(), 1);

        // The owner caches; the caller does not.
        assert_ok!(a.group.get(&key).await);
        assert_eq!(b.source.calls(), 1);
        assert_eq!(a.group.cache_stats().items, 0);
        assert_eq!(b.group.cache_stats().items, 1);

        let stats = a.group.stats();
        assert_eq!(stats.peer_loads, 2);
        assert_eq!(b.group.stats().server_requests, 2);
    }

    #[tokio::test]
    async fn test_local_key_loaded_locally() {
        let (a, b) = two_nodes(Duration::ZERO).await;
        let key = key_owned_by(&[&a.url, &b.url], &a.url);

        let value = assert_ok!(a.group.get(&key).await);
        assert_eq!(value.to_string(), format!("a:{}", key));
        assert_eq!(b.group.stats().server_requests, 0);
        assert_eq!(a.group.cache_stats().items, 1);
    }

    #[tokio::test]
    async fn test_remote_stampede_reaches_owner_once() {
        let (a, b) = two_nodes(Duration::from_millis(100)).await;
        let key = key_owned_by(&[&a.url, &b.url], &b.url);

        let gets = (0..20).map(|_| {
            let group = Arc::clone(&a.group);
            let key = key.clone();
            async move { group.get(&key).await }
        });
        let results = futures::future::join_all(gets).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(b.source.calls(), 1);
        assert_eq!(b.group.stats().server_requests, 1);
    }

    #[tokio::test]
    async fn test_dead_owner_falls_back_to_local_source() {
        let a = start_node("a", Duration::ZERO).await;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        a.pool.set([a.url.clone(), dead.clone()]);
        a.group.register_peers(a.pool.clone());

        let key = key_owned_by(&[&a.url, &dead], &dead);
        let value = assert_ok!(a.group.get(&key).await);

        assert_eq!(value.to_string(), format!("a:{}", key));
        assert_eq!(a.source.calls(), 1);
        assert_eq!(a.group.stats().peer_errors, 1);
    }

    #[tokio::test]
    async fn test_remote_data_source_error_surfaces_after_fallback() {
        let (a, b) = two_nodes(Duration::ZERO).await;
        let key = missing_key_owned_by(&[&a.url, &b.url], &b.url);

        let err = assert_err!(a.group.get(&key).await);
        assert_matches!(err, Error::DataSource(_));
        // The owner answered 500, so the caller retried against its own source.
        assert_eq!(b.source.calls(), 1);
        assert_eq!(a.source.calls(), 1);
        assert_eq!(a.group.stats().peer_errors, 1);
    }
}
