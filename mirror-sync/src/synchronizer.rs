//! Resource synchronizer: carries one resource to its target state.
//!
//! Every call reports exactly one outcome to [`Stats`], never retries, and
//! logs a failure at the moment it happens. Failures are also appended to a
//! [`FailureLog`] for the run report.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mirror_archive::MalformedRecord;
use mirror_core::{ResourceKind, ResourceRecord, SyncOutcome, Uid};
use mirror_store::InventoryStore;

use crate::consistency::{ConsistencyPolicy, Settled};
use crate::diff::{AlwaysReplace, UpdatePolicy};
use crate::stats::Stats;

/// Step of a synchronization that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedStep {
    /// Removing a target resource absent from the source.
    DeleteOrphan,
    /// Removing the target copy ahead of a replacement.
    Delete,
    Create,
    /// Reading the existing payload for the update policy.
    Fetch,
    /// The source item had no usable uid.
    Parse,
    /// The worker task ended without reporting.
    Aborted,
}

/// One failed operation, as written to the failure log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: ResourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Archive file the resource came from, when it came from one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub step: FailedStep,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only list of failures shared by all workers.
#[derive(Debug, Default)]
pub struct FailureLog {
    entries: Mutex<Vec<FailureRecord>>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: FailureRecord) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn snapshot(&self) -> Vec<FailureRecord> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cheap to clone; every clone shares the store, the counters and the failure log.
#[derive(Clone)]
pub struct Synchronizer {
    store: Arc<dyn InventoryStore>,
    stats: Arc<Stats>,
    failures: Arc<FailureLog>,
    consistency: ConsistencyPolicy,
    update_policy: Arc<dyn UpdatePolicy>,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn InventoryStore>, consistency: ConsistencyPolicy) -> Self {
        Self {
            store,
            stats: Arc::new(Stats::new()),
            failures: Arc::new(FailureLog::new()),
            consistency,
            update_policy: Arc::new(AlwaysReplace),
        }
    }

    pub fn with_update_policy(mut self, policy: Arc<dyn UpdatePolicy>) -> Self {
        self.update_policy = policy;
        self
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn failures(&self) -> &FailureLog {
        &self.failures
    }

    /// Make the target copy of `record` match the source.
    ///
    /// An existing target resource is deleted, then recreated once the delete
    /// has settled; a failed delete skips the create. When the resource has
    /// vanished since the inventory was taken it is simply recreated.
    pub async fn synchronize(&self, record: &ResourceRecord, target_exists: bool) -> SyncOutcome {
        let outcome = if target_exists {
            self.replace(record).await
        } else {
            self.create(record, SyncOutcome::Created).await
        };
        self.stats.record(record.kind, outcome);
        outcome
    }

    /// Delete a target resource that has no source counterpart.
    pub async fn delete_orphan(&self, kind: ResourceKind, uid: &Uid) -> SyncOutcome {
        let outcome = match self.store.delete(kind, uid).await {
            Ok(()) => {
                tracing::info!(%kind, %uid, "deleted orphan");
                SyncOutcome::Deleted
            }
            Err(err) if err.is_not_found() => {
                tracing::info!(%kind, %uid, "orphan already gone");
                SyncOutcome::Deleted
            }
            Err(err) => {
                tracing::error!(%kind, %uid, error = %err, "failed to delete orphan");
                self.fail(kind, Some(uid.clone()), None, None, FailedStep::DeleteOrphan, err);
                SyncOutcome::Failed
            }
        };
        self.stats.record(kind, outcome);
        outcome
    }

    /// Count a source item that could not be parsed as a failure.
    pub fn report_malformed(&self, malformed: &MalformedRecord) {
        tracing::error!(
            kind = %malformed.kind,
            origin = %malformed.origin,
            reason = %malformed.reason,
            "skipping malformed source resource"
        );
        self.fail(
            malformed.kind,
            None,
            None,
            Some(malformed.origin.clone()),
            FailedStep::Parse,
            &malformed.reason,
        );
        self.stats.record(malformed.kind, SyncOutcome::Failed);
    }

    /// Count a synchronization whose task died before reporting an outcome.
    pub fn report_aborted(&self, record: &ResourceRecord, reason: &str) {
        tracing::error!(
            kind = %record.kind,
            uid = %record.uid,
            reason,
            "synchronization task aborted"
        );
        self.fail_record(record, FailedStep::Aborted, reason);
        self.stats.record(record.kind, SyncOutcome::Failed);
    }

    /// Count a resource that is deliberately left alone.
    pub fn report_skipped(&self, kind: ResourceKind, uid: &Uid, reason: &str) {
        tracing::info!(%kind, %uid, reason, "skipped");
        self.stats.record(kind, SyncOutcome::Skipped);
    }

    async fn replace(&self, record: &ResourceRecord) -> SyncOutcome {
        let kind = record.kind;
        let uid = &record.uid;

        let existing = if self.update_policy.needs_existing_payload() {
            match self.store.fetch(kind, uid).await {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::error!(%kind, %uid, error = %err, "failed to read existing resource");
                    self.fail_record(record, FailedStep::Fetch, err);
                    return SyncOutcome::Failed;
                }
            }
        } else {
            None
        };
        if !self.update_policy.should_update(existing.as_ref(), record) {
            tracing::info!(%kind, %uid, "update policy kept the existing resource");
            return SyncOutcome::Skipped;
        }

        match self.store.delete(kind, uid).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                // Removed since the inventory was taken, e.g. with its parent folder.
                tracing::info!(%kind, %uid, "existing resource already gone, recreating");
                return self.create(record, SyncOutcome::Updated).await;
            }
            Err(err) => {
                tracing::error!(
                    %kind,
                    %uid,
                    error = %err,
                    "failed to delete existing resource, not recreating"
                );
                self.fail_record(record, FailedStep::Delete, err);
                return SyncOutcome::Failed;
            }
        }

        match self
            .consistency
            .wait_until_absent(self.store.as_ref(), kind, uid)
            .await
        {
            Settled::Absent | Settled::Paced => {}
            Settled::StillPresent => {
                tracing::warn!(%kind, %uid, "deleted resource still visible, creating anyway");
            }
            Settled::ProbeFailed(err) => {
                tracing::warn!(%kind, %uid, error = %err, "presence probe failed, creating anyway");
            }
        }

        self.create(record, SyncOutcome::Updated).await
    }

    async fn create(&self, record: &ResourceRecord, success: SyncOutcome) -> SyncOutcome {
        match self.store.create(record).await {
            Ok(assigned) => {
                if assigned != record.uid {
                    tracing::warn!(
                        kind = %record.kind,
                        uid = %record.uid,
                        assigned = %assigned,
                        "target assigned a different uid"
                    );
                }
                tracing::info!(
                    kind = %record.kind,
                    uid = %record.uid,
                    title = %record.display_name(),
                    outcome = %success,
                    "synchronized"
                );
                success
            }
            Err(err) => {
                tracing::error!(
                    kind = %record.kind,
                    uid = %record.uid,
                    title = %record.display_name(),
                    error = %err,
                    "failed to create resource"
                );
                self.fail_record(record, FailedStep::Create, err);
                SyncOutcome::Failed
            }
        }
    }

    fn fail_record(&self, record: &ResourceRecord, step: FailedStep, err: impl ToString) {
        self.fail(
            record.kind,
            Some(record.uid.clone()),
            record.title.clone(),
            Some(record.origin.clone()),
            step,
            err,
        );
    }

    fn fail(
        &self,
        kind: ResourceKind,
        uid: Option<Uid>,
        title: Option<String>,
        origin: Option<String>,
        step: FailedStep,
        err: impl ToString,
    ) {
        self.failures.push(FailureRecord {
            kind,
            uid,
            title,
            origin,
            step,
            error: err.to_string(),
            timestamp: Utc::now(),
        });
    }
}
