//! Diff engine: partition one kind's resources into orphans, replacements and
//! creations.
//!
//! Membership is uid string equality only. Payloads are never compared here;
//! whether an existing resource is replaced is decided later by an
//! [`UpdatePolicy`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use mirror_archive::{MalformedRecord, SourceEntry};
use mirror_core::{InventorySet, ResourceKind, ResourceRecord, Uid};

/// One source resource scheduled for synchronization.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub record: Arc<ResourceRecord>,
    /// Whether the uid was in the target inventory (delete + recreate).
    pub target_exists: bool,
}

/// The diff for one resource kind.
#[derive(Debug, Clone)]
pub struct KindPlan {
    pub kind: ResourceKind,
    /// Target uids with no source counterpart, sorted. Never contains the protected uid.
    pub orphans: Vec<Uid>,
    /// Source resources to synchronize, in source order (folders reordered so
    /// parents come before their children).
    pub work: Vec<WorkItem>,
    /// Source resources carrying the protected uid; left untouched.
    pub protected: Vec<Arc<ResourceRecord>>,
    /// Source items without a usable uid, or repeating an earlier uid.
    pub malformed: Vec<MalformedRecord>,
    /// Number of source entries the plan was built from.
    pub source_len: usize,
    /// Number of uids in the target inventory.
    pub target_len: usize,
}

impl KindPlan {
    /// Work items whose uid already exists in the target.
    pub fn existing(&self) -> impl Iterator<Item = &WorkItem> {
        self.work.iter().filter(|item| item.target_exists)
    }

    /// Work items to create fresh.
    pub fn new_items(&self) -> impl Iterator<Item = &WorkItem> {
        self.work.iter().filter(|item| !item.target_exists)
    }

    /// Source records with a usable uid (protected ones included).
    pub fn valid_source_len(&self) -> usize {
        self.work.len() + self.protected.len()
    }
}

/// Compute the plan for `inventory.kind()` from the target inventory and the
/// source entries of the same kind.
pub fn plan_kind(inventory: &InventorySet, entries: Vec<SourceEntry>) -> KindPlan {
    let kind = inventory.kind();
    let source_len = entries.len();
    let mut first_seen: HashMap<Uid, String> = HashMap::new();
    let mut work = Vec::new();
    let mut protected = Vec::new();
    let mut malformed = Vec::new();

    for entry in entries {
        let record = match entry {
            SourceEntry::Record(record) if record.kind == kind => record,
            SourceEntry::Record(record) => {
                malformed.push(MalformedRecord {
                    kind,
                    origin: record.origin,
                    reason: format!("expected a {kind}, found a {}", record.kind),
                });
                continue;
            }
            SourceEntry::Malformed(bad) => {
                malformed.push(bad);
                continue;
            }
        };

        if let Some(first) = first_seen.get(&record.uid) {
            malformed.push(MalformedRecord {
                kind,
                origin: record.origin.clone(),
                reason: format!("duplicate uid {} (first seen in {first})", record.uid),
            });
            continue;
        }
        first_seen.insert(record.uid.clone(), record.origin.clone());

        if record.uid.is_protected() {
            protected.push(Arc::new(record));
            continue;
        }

        let target_exists = inventory.contains(&record.uid);
        work.push(WorkItem {
            record: Arc::new(record),
            target_exists,
        });
    }

    if kind == ResourceKind::Folder {
        parents_first(&mut work);
    }

    let orphans = inventory
        .iter()
        .filter(|uid| !uid.is_protected() && !first_seen.contains_key(*uid))
        .cloned()
        .collect();

    KindPlan {
        kind,
        orphans,
        work,
        protected,
        malformed,
        source_len,
        target_len: inventory.len(),
    }
}

/// Stable-sort folder work so a folder follows its `parentUid` whenever the
/// parent is also in the source.
fn parents_first(work: &mut [WorkItem]) {
    let parents: HashMap<&str, &str> = work
        .iter()
        .filter_map(|item| {
            let parent = item.record.payload.get("parentUid")?.as_str()?;
            Some((item.record.uid.as_str(), parent))
        })
        .filter(|(_, parent)| !parent.is_empty())
        .collect();
    let in_source: HashSet<&str> = work.iter().map(|item| item.record.uid.as_str()).collect();

    // Depth is bounded by the item count so a parent cycle cannot loop forever.
    let depth_of = |uid: &str| {
        let mut depth = 0;
        let mut current = uid;
        while let Some(&parent) = parents.get(current) {
            if !in_source.contains(parent) || depth >= work.len() {
                break;
            }
            depth += 1;
            current = parent;
        }
        depth
    };
    let depths: HashMap<Uid, usize> = work
        .iter()
        .map(|item| (item.record.uid.clone(), depth_of(item.record.uid.as_str())))
        .collect();

    work.sort_by_key(|item| depths.get(&item.record.uid).copied().unwrap_or(0));
}

// ---------------------------------------------------------------------------
// Update policy
// ---------------------------------------------------------------------------

/// Decides whether an existing target resource is replaced by its source.
pub trait UpdatePolicy: Send + Sync {
    /// Whether [`UpdatePolicy::should_update`] needs the target's current payload.
    ///
    /// When false the synchronizer passes `None` and skips the fetch.
    fn needs_existing_payload(&self) -> bool {
        false
    }

    fn should_update(&self, existing: Option<&Value>, incoming: &ResourceRecord) -> bool;
}

/// Unconditional delete-and-recreate of every existing match.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReplace;

impl UpdatePolicy for AlwaysReplace {
    fn should_update(&self, _existing: Option<&Value>, _incoming: &ResourceRecord) -> bool {
        true
    }
}
