//! Opaque server-issued markers: change tokens and query cursors.
//!
//! Both are carried as raw bytes and never interpreted on the client. The
//! only guarantee is a format-preserving round trip: what the remote store
//! handed out is exactly what gets presented back.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker meaning "all changes observed up to here" for one partition.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeToken(Vec<u8>);

impl ChangeToken {
    /// Wrap raw token bytes as returned by the remote store.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw token bytes, for persistence.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the token and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", URL_SAFE_NO_PAD.encode(&self.0))
    }
}

impl fmt::Debug for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_string();
        write!(f, "ChangeToken({})", truncate(&encoded))
    }
}

/// Continuation marker for resuming a paginated query at the next page.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryCursor(Vec<u8>);

impl QueryCursor {
    /// Wrap raw cursor bytes as returned by the remote store.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw cursor bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for QueryCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", URL_SAFE_NO_PAD.encode(&self.0))
    }
}

impl fmt::Debug for QueryCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_string();
        write!(f, "QueryCursor({})", truncate(&encoded))
    }
}

fn truncate(encoded: &str) -> &str {
    // base64 output is ASCII, so any byte index is a char boundary
    &encoded[..encoded.len().min(12)]
}
