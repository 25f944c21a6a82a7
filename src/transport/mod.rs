//! Peer Transports
//!
//! Implementations of [`PeerPicker`](crate::PeerPicker) and
//! [`PeerGetter`](crate::PeerGetter). The core never depends on this module;
//! any transport that satisfies the two ports can be swapped in.

pub mod http;

pub use http::{HttpGetter, HttpPool, HttpPoolConfig, DEFAULT_BASE_PATH};
