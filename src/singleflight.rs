//! Single-Flight Request Deduplication
//!
//! Collapses concurrent loads of the same key into one execution. The first
//! caller for an idle key runs the loader; everyone who arrives while it is
//! running waits for that result and receives a clone of it.
//!
//! # Design
//!
//! - In-flight calls live in a `parking_lot::Mutex<HashMap<..>>`; the lock is
//!   held only to register or remove a call, never while the loader runs
//! - Completion is a `tokio::sync::watch` channel holding `Option<Result>`
//! - The leader removes its call through a drop guard, so a cancelled leader
//!   cannot leave the key stuck; its followers retry, and one of them leads
//!   the next call

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

type Slot<T, E> = Option<Result<T, E>>;

/// How a caller took part in a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Ran the loader
    Leader,
    /// Waited for another caller's loader
    Follower,
}

enum Entry<T, E> {
    Leader(watch::Sender<Slot<T, E>>),
    Follower(watch::Receiver<Slot<T, E>>),
}

/// Table of in-flight calls keyed by string
pub struct SingleFlight<T, E> {
    calls: Mutex<HashMap<String, watch::Receiver<Slot<T, E>>>>,
}

impl<T, E> Default for SingleFlight<T, E> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `loader` for `key` unless a call for it is already in flight
    pub async fn run<F, Fut>(&self, key: &str, loader: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_tracked(key, loader).await.0
    }

    /// Like [`run`](Self::run), also reporting whether this caller led the call
    pub async fn run_tracked<F, Fut>(&self, key: &str, loader: F) -> (Result<T, E>, Role)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        loop {
            let entry = {
                let mut calls = self.calls.lock();
                match calls.get(key) {
                    Some(rx) => Entry::Follower(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        calls.insert(key.to_string(), rx);
                        Entry::Leader(tx)
                    }
                }
            };

            match entry {
                Entry::Leader(tx) => {
                    let guard = CallGuard {
                        calls: &self.calls,
                        key,
                        tx,
                    };
                    let result = loader().await;
                    guard.tx.send_replace(Some(result.clone()));
                    drop(guard);
                    return (result, Role::Leader);
                }
                Entry::Follower(mut rx) => {
                    trace!(key, "joining in-flight call");
                    if let Ok(slot) = rx.wait_for(Option::is_some).await {
                        if let Some(result) = slot.as_ref() {
                            return (result.clone(), Role::Follower);
                        }
                    }
                    // The leader was dropped without a result.
                    trace!(key, "in-flight call abandoned, retrying");
                }
            }
        }
    }

    /// Number of keys with a call in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Removes the leader's call from the table when the leader finishes or is dropped
struct CallGuard<'a, T, E> {
    calls: &'a Mutex<HashMap<String, watch::Receiver<Slot<T, E>>>>,
    key: &'a str,
    tx: watch::Sender<Slot<T, E>>,
}

impl<T, E> Drop for CallGuard<'_, T, E> {
    fn drop(&mut self) {
        self.calls.lock().remove(self.key);
    }
}

// =============================================================================
// Tests
// =============================================================================
