//! Error types for meshcache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or serving cached values.
///
/// Every payload is plain data so one loader result can be cloned out to
/// every caller that was waiting on the same key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `Group::get` was called with an empty key
    #[error("key is required")]
    InvalidKey,

    /// No group is registered under this name
    #[error("no such group: {0}")]
    GroupNotFound(String),

    /// The caller-supplied data source failed
    #[error("data source error: {0}")]
    DataSource(String),

    /// A remote peer could not serve the request
    #[error("peer transport error: {0}")]
    PeerTransport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap any displayable failure as a data source error
    pub fn data_source(err: impl std::fmt::Display) -> Self {
        Error::DataSource(err.to_string())
    }

    /// Wrap any displayable failure as a peer transport error
    pub fn peer_transport(err: impl std::fmt::Display) -> Self {
        Error::PeerTransport(err.to_string())
    }

    /// True for failures a caller recovers from by loading locally
    pub fn is_peer_failure(&self) -> bool {
        matches!(self, Error::PeerTransport(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(format!("I/O error: {}", err))
    }
}
