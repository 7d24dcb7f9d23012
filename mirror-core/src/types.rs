//! Domain types for tenant mirroring.
//!
//! Resources are identified across tenants by their [`Uid`] only; payloads are
//! carried as opaque JSON and never compared.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uid of the built-in default folder. It is never deleted from a target and
/// never recreated there.
pub const PROTECTED_FOLDER_UID: &str = "general";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A stable cross-tenant identifier for a folder or dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub String);

impl Uid {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the protected default-folder uid.
    pub fn is_protected(&self) -> bool {
        self.0 == PROTECTED_FOLDER_UID
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Uid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Uid {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The two resource kinds a tenant mirror reconciles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Folder,
    Dashboard,
}

impl ResourceKind {
    /// Every kind, in synchronization order (folders stabilise first).
    pub fn all() -> &'static [ResourceKind] {
        &[ResourceKind::Folder, ResourceKind::Dashboard]
    }

    /// Archive sub-directory holding this kind's files.
    pub fn dir_name(self) -> &'static str {
        match self {
            ResourceKind::Folder => "folders",
            ResourceKind::Dashboard => "dashboards",
        }
    }

    /// Plural, capitalised label for reports.
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Folder => "Folders",
            ResourceKind::Dashboard => "Dashboards",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Folder => write!(f, "folder"),
            ResourceKind::Dashboard => write!(f, "dashboard"),
        }
    }
}

/// Result of one attempted operation on one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Created,
    Updated,
    Deleted,
    Failed,
    /// Not an operation: the resource was deliberately left alone.
    Skipped,
}

impl SyncOutcome {
    pub fn all() -> &'static [SyncOutcome] {
        &[
            SyncOutcome::Created,
            SyncOutcome::Updated,
            SyncOutcome::Deleted,
            SyncOutcome::Failed,
            SyncOutcome::Skipped,
        ]
    }

    /// Whether this outcome counts toward attempted operations.
    pub fn is_operation(self) -> bool {
        !matches!(self, SyncOutcome::Skipped)
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncOutcome::Created => "created",
            SyncOutcome::Updated => "updated",
            SyncOutcome::Deleted => "deleted",
            SyncOutcome::Failed => "failed",
            SyncOutcome::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A source resource loaded from the archive. Immutable for the run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub uid: Uid,
    pub title: Option<String>,
    /// Where the record came from (archive file path, or a synthetic label).
    pub origin: String,
    /// The serialized configuration blob as exported from the source tenant.
    pub payload: Value,
}

impl ResourceRecord {
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(self.uid.as_str())
    }
}

/// Uids present in the target store for one kind at fetch time.
///
/// Built once per run and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventorySet {
    kind: ResourceKind,
    uids: BTreeSet<Uid>,
}

impl InventorySet {
    pub fn new(kind: ResourceKind, uids: impl IntoIterator<Item = Uid>) -> Self {
        Self {
            kind,
            uids: uids.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn contains(&self, uid: &Uid) -> bool {
        self.uids.contains(uid)
    }

    pub fn len(&self) -> usize {
        self.uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    /// Uids in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Uid> {
        self.uids.iter()
    }

    /// Count of uids that a run could ever delete (everything but the protected uid).
    pub fn deletable_len(&self) -> usize {
        self.uids.iter().filter(|uid| !uid.is_protected()).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
