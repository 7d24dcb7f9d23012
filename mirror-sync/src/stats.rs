//! Outcome counters shared by every synchronization task.
//!
//! Each (kind, outcome) cell is an atomic integer, so concurrent workers
//! increment without a lock and without lost updates. The table is read once,
//! after all workers have finished.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use mirror_core::{ResourceKind, SyncOutcome};

const KINDS: usize = 2;
const OUTCOMES: usize = 5;

fn kind_index(kind: ResourceKind) -> usize {
    match kind {
        ResourceKind::Folder => 0,
        ResourceKind::Dashboard => 1,
    }
}

fn outcome_index(outcome: SyncOutcome) -> usize {
    match outcome {
        SyncOutcome::Created => 0,
        SyncOutcome::Updated => 1,
        SyncOutcome::Deleted => 2,
        SyncOutcome::Failed => 3,
        SyncOutcome::Skipped => 4,
    }
}

/// The statistics aggregator. Zeroed at construction.
#[derive(Debug, Default)]
pub struct Stats {
    cells: [[AtomicUsize; OUTCOMES]; KINDS],
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: ResourceKind, outcome: SyncOutcome) {
        self.cell(kind, outcome).fetch_add(1, Ordering::Relaxed);
    }

    /// Move one Created to Updated for `kind`.
    ///
    /// For callers that report a create before learning it replaced an
    /// existing resource. Created never drops below zero.
    pub fn reclassify_as_updated(&self, kind: ResourceKind) {
        let _ = self.cell(kind, SyncOutcome::Created).fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |n| Some(n.saturating_sub(1)),
        );
        self.record(kind, SyncOutcome::Updated);
    }

    pub fn get(&self, kind: ResourceKind, outcome: SyncOutcome) -> usize {
        self.cell(kind, outcome).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterTable {
        let mut kinds = BTreeMap::new();
        for kind in ResourceKind::all() {
            kinds.insert(
                *kind,
                KindCounts {
                    created: self.get(*kind, SyncOutcome::Created),
                    updated: self.get(*kind, SyncOutcome::Updated),
                    deleted: self.get(*kind, SyncOutcome::Deleted),
                    failed: self.get(*kind, SyncOutcome::Failed),
                    skipped: self.get(*kind, SyncOutcome::Skipped),
                },
            );
        }
        CounterTable { kinds }
    }

    fn cell(&self, kind: ResourceKind, outcome: SyncOutcome) -> &AtomicUsize {
        &self.cells[kind_index(kind)][outcome_index(outcome)]
    }
}

/// Final counts for one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl KindCounts {
    pub fn succeeded(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Operations attempted: successes plus failures.
    pub fn total_operations(&self) -> usize {
        self.succeeded() + self.failed
    }

    fn add(&mut self, other: &KindCounts) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Snapshot of the aggregator after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterTable {
    pub kinds: BTreeMap<ResourceKind, KindCounts>,
}

impl CounterTable {
    pub fn kind(&self, kind: ResourceKind) -> KindCounts {
        self.kinds.get(&kind).copied().unwrap_or_default()
    }

    pub fn totals(&self) -> KindCounts {
        let mut totals = KindCounts::default();
        for counts in self.kinds.values() {
            totals.add(counts);
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn record_increments_only_its_cell() {
        let stats = Stats::new();
        stats.record(ResourceKind::Dashboard, SyncOutcome::Created);
        stats.record(ResourceKind::Dashboard, SyncOutcome::Created);
        stats.record(ResourceKind::Folder, SyncOutcome::Failed);

        let table = stats.snapshot();
        assert_eq!(table.kind(ResourceKind::Dashboard).created, 2);
        assert_eq!(table.kind(ResourceKind::Folder).failed, 1);
        assert_eq!(table.kind(ResourceKind::Folder).created, 0);
    }

    #[test]
    fn reclassify_moves_created_to_updated() {
        let stats = Stats::new();
        stats.record(ResourceKind::Folder, SyncOutcome::Created);
        stats.reclassify_as_updated(ResourceKind::Folder);

        let counts = stats.snapshot().kind(ResourceKind::Folder);
        assert_eq!(counts.created, 0);
        assert_eq!(counts.updated, 1);
    }

    #[test]
    fn reclassify_never_underflows() {
        let stats = Stats::new();
        stats.reclassify_as_updated(ResourceKind::Dashboard);
        let counts = stats.snapshot().kind(ResourceKind::Dashboard);
        assert_eq!(counts.created, 0);
        assert_eq!(counts.updated, 1);
    }

    #[test]
    fn totals_sum_across_kinds() {
        let stats = Stats::new();
        stats.record(ResourceKind::Folder, SyncOutcome::Deleted);
        stats.record(ResourceKind::Dashboard, SyncOutcome::Updated);
        stats.record(ResourceKind::Dashboard, SyncOutcome::Skipped);
        let totals = stats.snapshot().totals();
        assert_eq!(totals.succeeded(), 2);
        assert_eq!(totals.skipped, 1);
        assert_eq!(totals.total_operations(), 2, "skips are not operations");
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let stats = Arc::new(Stats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record(ResourceKind::Dashboard, SyncOutcome::Created);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.get(ResourceKind::Dashboard, SyncOutcome::Created), 8000);
    }
}
