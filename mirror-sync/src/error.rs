//! Error types for mirror-sync.
//!
//! Only run-level failures are errors. A single resource that fails to
//! delete or create is an outcome, not an error.

use std::path::PathBuf;

use thiserror::Error;

use mirror_archive::ArchiveError;
use mirror_core::ResourceKind;
use mirror_store::StoreError;

/// All errors that abort a mirror run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The target inventory could not be read; nothing was changed.
    #[error("{kind} inventory unavailable: {source}")]
    InventoryUnavailable {
        kind: ResourceKind,
        #[source]
        source: StoreError,
    },

    /// The source archive could not be read.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// The source is empty but the target is not; refusing to delete everything.
    #[error(
        "source contains no resources but the target holds {target}; refusing to delete them all \
         (set allow_empty_source to override)"
    )]
    UnsafeMassDeletion { target: usize },

    /// An I/O error writing report artifacts, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (report artifacts).
    #[error("report JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
