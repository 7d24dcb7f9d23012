//! Error types for mirror-store.

use thiserror::Error;

use mirror_core::{ResourceKind, Uid};

/// All errors a store call can produce.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a response (DNS, connect, timeout, TLS).
    #[error("{op} {url}: request failed: {source}")]
    Transport {
        op: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The store answered with a non-success status.
    #[error("{op} {url}: HTTP {status}: {body}")]
    Status {
        op: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    /// The resource addressed by `uid` does not exist.
    #[error("{op} {kind} {uid}: not found")]
    NotFound {
        op: &'static str,
        kind: ResourceKind,
        uid: Uid,
    },

    /// The response body could not be understood.
    #[error("{op} {url}: unexpected response: {reason}")]
    Decode {
        op: &'static str,
        url: String,
        reason: String,
    },

    /// The client could not be constructed from the given settings.
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// The store refused the operation without a transport-level reason.
    #[error("{op} rejected: {reason}")]
    Rejected { op: &'static str, reason: String },
}

impl StoreError {
    /// HTTP status code, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Status { status, .. } => Some(*status),
            StoreError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Whether the addressed resource was already absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
