//! Error types for mirror-archive.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that make the archive unusable as a whole.
///
/// A single unreadable resource file is not an error here; it surfaces as a
/// [`crate::MalformedRecord`] instead.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive root directory does not exist.
    #[error("archive not found at {path}")]
    NotFound { path: PathBuf },

    /// An I/O error while listing a directory, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`ArchiveError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ArchiveError {
    ArchiveError::Io {
        path: path.into(),
        source,
    }
}
