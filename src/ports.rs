//! Capability Ports
//!
//! The abstractions a [`Group`](crate::Group) depends on. Callers supply a
//! [`DataSource`]; a transport supplies [`PeerPicker`] and [`PeerGetter`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Group (core)                          │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │     DataSource  │  PeerPicker  │  PeerGetter         │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Adapters (Impls)                         │
//! │   DataSourceFn  │  HttpPool  │  HttpGetter  │  test doubles  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

// =============================================================================
// Data Source
// =============================================================================

/// Source of truth consulted when no cache or peer has a key.
///
/// Failures should be reported as [`Error::DataSource`](crate::Error::DataSource).
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Load the value for `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// Adapts a plain function or closure into a [`DataSource`]
pub struct DataSourceFn<F>(pub F);

#[async_trait]
impl<F> DataSource for DataSourceFn<F>
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        (self.0)(key)
    }
}

#[async_trait]
impl<T: DataSource + ?Sized> DataSource for Arc<T> {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        (**self).get(key).await
    }
}

// =============================================================================
// Peers
// =============================================================================

/// Fetches a group's value from a remote peer
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Fetch `key` of `group` from the peer.
    ///
    /// Failures should be reported as
    /// [`Error::PeerTransport`](crate::Error::PeerTransport).
    async fn fetch(&self, group: &str, key: &str) -> Result<Bytes>;
}

/// Chooses the peer that owns a key
pub trait PeerPicker: Send + Sync {
    /// The remote owner of `key`, or `None` when this node owns it.
    ///
    /// Implementations must never return the local node.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}
