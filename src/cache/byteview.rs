//! Immutable Cache Values
//!
//! `ByteView` is the only value type handed out by a group. It wraps a
//! reference-counted `Bytes` buffer, so clones are cheap and nothing a caller
//! does to its copy can reach the bytes held by the cache.

use std::fmt;

use bytes::Bytes;

use super::lru::Weighted;

/// Read-only view over a cached byte blob
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    b: Bytes,
}

impl ByteView {
    /// Create a view by copying the given slice
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            b: Bytes::copy_from_slice(data),
        }
    }

    /// Length of the value in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.b.len()
    }

    /// Check if the value is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Borrow the underlying bytes
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.b
    }

    /// Return an owned copy of the data
    pub fn byte_slice(&self) -> Vec<u8> {
        self.b.to_vec()
    }

    /// Cheap handle to the shared buffer, for zero-copy responses
    pub fn to_bytes(&self) -> Bytes {
        self.b.clone()
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(v: Vec<u8>) -> Self {
        Self { b: Bytes::from(v) }
    }
}

impl From<Bytes> for ByteView {
    fn from(b: Bytes) -> Self {
        Self { b }
    }
}

impl From<&'static str> for ByteView {
    fn from(s: &'static str) -> Self {
        Self {
            b: Bytes::from_static(s.as_bytes()),
        }
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        &self.b
    }
}

impl Weighted for ByteView {
    fn weight(&self) -> usize {
        self.b.len()
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.b))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView").field("len", &self.b.len()).finish()
    }
}
