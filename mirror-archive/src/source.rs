//! Source providers.
//!
//! # Archive layout
//!
//! ```text
//! <archive>/
//!   folders/
//!     <uid>.json
//!   dashboards/
//!     <uid>.json
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use mirror_core::{ResourceKind, ResourceRecord};

use crate::error::{io_err, ArchiveError};
use crate::record::{parse_record, MalformedRecord, SourceEntry};

/// Yields the authoritative source inventory for one resource kind.
pub trait SourceProvider: Send + Sync {
    /// Every source item of `kind`, in a stable order.
    fn entries(&self, kind: ResourceKind) -> Result<Vec<SourceEntry>, ArchiveError>;
}

// ---------------------------------------------------------------------------
// ArchiveSource
// ---------------------------------------------------------------------------

/// Reads exported resources from a directory tree, one JSON file per resource.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    root: PathBuf,
}

impl ArchiveSource {
    /// Open the archive at `root`. Fails if the directory does not exist.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ArchiveError::NotFound { path: root });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_dir(&self, kind: ResourceKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }
}

impl SourceProvider for ArchiveSource {
    fn entries(&self, kind: ResourceKind) -> Result<Vec<SourceEntry>, ArchiveError> {
        let dir = self.kind_dir(kind);
        let read = match std::fs::read_dir(&dir) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::warn!(kind = %kind, path = %dir.display(), "archive directory missing; treating as empty");
                return Ok(Vec::new());
            }
            Err(err) => return Err(io_err(&dir, err)),
        };

        let mut files = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            let path = entry.path();
            let is_json = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if is_json && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            let origin = path.display().to_string();
            let entry = match std::fs::read_to_string(&path) {
                Ok(contents) => parse_record(kind, &origin, &contents),
                Err(err) => SourceEntry::Malformed(MalformedRecord {
                    kind,
                    origin,
                    reason: format!("unreadable: {err}"),
                }),
            };
            if let SourceEntry::Malformed(bad) = &entry {
                tracing::warn!(kind = %kind, origin = %bad.origin, reason = %bad.reason, "skipping malformed archive entry");
            }
            entries.push(entry);
        }

        tracing::debug!(kind = %kind, count = entries.len(), path = %dir.display(), "loaded archive entries");
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Serves a fixed set of entries; used by tests and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: Vec<SourceEntry>,
}

impl MemorySource {
    pub fn new(entries: Vec<SourceEntry>) -> Self {
        Self { entries }
    }

    pub fn from_records(records: impl IntoIterator<Item = ResourceRecord>) -> Self {
        Self::new(records.into_iter().map(SourceEntry::Record).collect())
    }

    pub fn push(&mut self, entry: SourceEntry) {
        self.entries.push(entry);
    }
}

impl SourceProvider for MemorySource {
    fn entries(&self, kind: ResourceKind) -> Result<Vec<SourceEntry>, ArchiveError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.kind() == kind)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use mirror_core::Uid;

    use super::*;

    #[test]
    fn memory_source_filters_by_kind() {
        let folder = ResourceRecord {
            kind: ResourceKind::Folder,
            uid: Uid::from("f1"),
            title: None,
            origin: "mem".to_string(),
            payload: json!({"uid": "f1"}),
        };
        let dashboard = ResourceRecord {
            kind: ResourceKind::Dashboard,
            uid: Uid::from("d1"),
            ..folder.clone()
        };
        let source = MemorySource::from_records([folder, dashboard]);

        let folders = source.entries(ResourceKind::Folder).expect("entries");
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].kind(), ResourceKind::Folder);
    }

    #[test]
    fn open_missing_root_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = ArchiveSource::open(tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, ArchiveError::NotFound { .. }));
        assert!(err.to_string().contains("absent"));
    }
}
