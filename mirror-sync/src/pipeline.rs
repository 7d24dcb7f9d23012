//! Run entrypoints shared by `mirror sync` and `mirror plan`.
//!
//! A run goes through these steps in order:
//!
//! 1. read the source archive for every kind;
//! 2. fetch every target inventory (any failure aborts before a mutation);
//! 3. diff each kind and check the mass-deletion guard;
//! 4. count malformed and protected source items;
//! 5. delete orphans sequentially, dashboards before folders;
//! 6. synchronize folders sequentially, then dashboards in batches;
//! 7. list the target again and evaluate the counters.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use mirror_archive::{SourceEntry, SourceProvider};
use mirror_core::{MirrorConfig, ResourceKind, Uid};
use mirror_store::InventoryStore;

use crate::consistency::ConsistencyPolicy;
use crate::diff::{plan_kind, AlwaysReplace, KindPlan, UpdatePolicy};
use crate::error::SyncError;
use crate::inventory::fetch_inventory;
use crate::outcome::evaluate;
use crate::report::{KindReport, RunReport};
use crate::safety::check_mass_deletion;
use crate::scheduler::{run_batched, run_sequential, BatchPolicy};
use crate::synchronizer::Synchronizer;

/// Knobs for one run.
#[derive(Clone)]
pub struct RunOptions {
    /// Target label recorded in the report (normally its base url).
    pub target: String,
    pub batch: BatchPolicy,
    pub consistency: ConsistencyPolicy,
    pub success_threshold: f64,
    pub allow_empty_source: bool,
    pub update_policy: Arc<dyn UpdatePolicy>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from(&MirrorConfig::default())
    }
}

impl From<&MirrorConfig> for RunOptions {
    fn from(config: &MirrorConfig) -> Self {
        Self {
            target: config.target.url.clone().unwrap_or_default(),
            batch: BatchPolicy::from(config),
            consistency: ConsistencyPolicy::from(&config.consistency),
            success_threshold: config.success_threshold,
            allow_empty_source: config.allow_empty_source,
            update_policy: Arc::new(AlwaysReplace),
        }
    }
}

/// Source entries and target inventory diffed for every kind, in kind order.
async fn build_plans(
    store: &dyn InventoryStore,
    source: &dyn SourceProvider,
) -> Result<Vec<KindPlan>, SyncError> {
    let mut entries: Vec<(ResourceKind, Vec<SourceEntry>)> = Vec::new();
    for kind in ResourceKind::all() {
        let loaded = source.entries(*kind)?;
        tracing::info!(%kind, count = loaded.len(), "loaded source resources");
        entries.push((*kind, loaded));
    }

    let mut inventories = Vec::new();
    for kind in ResourceKind::all() {
        inventories.push(fetch_inventory(store, *kind).await?);
    }

    Ok(inventories
        .iter()
        .zip(entries)
        .map(|(inventory, (_, entries))| plan_kind(inventory, entries))
        .collect())
}

/// Reconcile the target behind `store` with `source`.
pub async fn run(
    store: Arc<dyn InventoryStore>,
    source: &dyn SourceProvider,
    options: &RunOptions,
) -> Result<RunReport, SyncError> {
    let started_at = Utc::now();
    let clock = Instant::now();

    let plans = build_plans(store.as_ref(), source).await?;
    check_mass_deletion(&plans, options.allow_empty_source)?;

    let sync = Synchronizer::new(Arc::clone(&store), options.consistency)
        .with_update_policy(Arc::clone(&options.update_policy));

    for plan in &plans {
        for malformed in &plan.malformed {
            sync.report_malformed(malformed);
        }
        for record in &plan.protected {
            sync.report_skipped(plan.kind, &record.uid, "protected folder");
        }
    }

    // Orphans go first so that nothing created below can be caught by them.
    for plan in plans.iter().rev() {
        if !plan.orphans.is_empty() {
            tracing::info!(kind = %plan.kind, count = plan.orphans.len(), "deleting orphans");
        }
        for uid in &plan.orphans {
            sync.delete_orphan(plan.kind, uid).await;
        }
    }

    for plan in &plans {
        tracing::info!(
            kind = %plan.kind,
            replace = plan.existing().count(),
            create = plan.new_items().count(),
            "synchronizing"
        );
        match plan.kind {
            ResourceKind::Folder => run_sequential(&sync, &plan.work).await,
            ResourceKind::Dashboard => run_batched(&sync, &plan.work, options.batch).await,
        }
    }

    let mut kinds = Vec::new();
    let counts = sync.stats().snapshot();
    for plan in &plans {
        let target_after = match store.list(plan.kind).await {
            Ok(uids) => Some(uids.len()),
            Err(err) => {
                tracing::warn!(kind = %plan.kind, error = %err, "post-run listing failed");
                None
            }
        };
        kinds.push(KindReport::new(
            plan.kind,
            plan.source_len,
            plan.target_len,
            target_after,
            counts.kind(plan.kind),
        ));
    }

    let result = evaluate(counts, options.success_threshold);
    tracing::info!(
        succeeded = result.succeeded,
        failed = result.failed,
        success_rate = result.success_rate,
        "run finished"
    );

    Ok(RunReport {
        started_at,
        finished_at: Utc::now(),
        duration_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        target: options.target.clone(),
        kinds,
        result,
        failures: sync.failures().snapshot(),
    })
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

/// What a run would do for one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindPlanSummary {
    pub kind: ResourceKind,
    pub source: usize,
    pub target: usize,
    pub to_delete: usize,
    pub to_replace: usize,
    pub to_create: usize,
    pub malformed: usize,
    pub protected: usize,
    pub orphans: Vec<Uid>,
}

impl From<&KindPlan> for KindPlanSummary {
    fn from(plan: &KindPlan) -> Self {
        Self {
            kind: plan.kind,
            source: plan.source_len,
            target: plan.target_len,
            to_delete: plan.orphans.len(),
            to_replace: plan.existing().count(),
            to_create: plan.new_items().count(),
            malformed: plan.malformed.len(),
            protected: plan.protected.len(),
            orphans: plan.orphans.clone(),
        }
    }
}

/// Result of a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    pub target: String,
    pub kinds: Vec<KindPlanSummary>,
    /// Why a real run would be refused, if it would.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<String>,
}

impl RunPlan {
    pub fn kind(&self, kind: ResourceKind) -> Option<&KindPlanSummary> {
        self.kinds.iter().find(|k| k.kind == kind)
    }
}

/// Compute the run's plan without issuing a single mutating call.
pub async fn plan(
    store: &dyn InventoryStore,
    source: &dyn SourceProvider,
    options: &RunOptions,
) -> Result<RunPlan, SyncError> {
    let plans = build_plans(store, source).await?;
    let blocked = check_mass_deletion(&plans, options.allow_empty_source)
        .err()
        .map(|err| err.to_string());
    Ok(RunPlan {
        target: options.target.clone(),
        kinds: plans.iter().map(KindPlanSummary::from).collect(),
        blocked,
    })
}
