//! Batch scheduler: drives the synchronizer over a worklist.
//!
//! Batches run strictly in order. Inside a batch, groups of at most
//! `max_parallel` items run concurrently and the whole group finishes before
//! the next group starts.

use std::sync::Arc;

use tokio::task::JoinSet;

use mirror_core::config::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_PARALLEL};
use mirror_core::MirrorConfig;

use crate::diff::WorkItem;
use crate::synchronizer::Synchronizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub max_parallel: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }
}

impl From<&MirrorConfig> for BatchPolicy {
    fn from(config: &MirrorConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_parallel: config.max_parallel,
        }
    }
}

impl BatchPolicy {
    /// One item at a time.
    pub fn sequential() -> Self {
        Self {
            batch_size: 1,
            max_parallel: 1,
        }
    }
}

/// Synchronize `items` one after another, in order.
pub async fn run_sequential(sync: &Synchronizer, items: &[WorkItem]) {
    for item in items {
        sync.synchronize(&item.record, item.target_exists).await;
    }
}

/// Synchronize `items` in batches of `policy.batch_size`, running groups of
/// up to `policy.max_parallel` concurrently.
pub async fn run_batched(sync: &Synchronizer, items: &[WorkItem], policy: BatchPolicy) {
    let batch_size = policy.batch_size.max(1);
    let max_parallel = policy.max_parallel.max(1);
    let batches = items.len().div_ceil(batch_size);

    for (index, batch) in items.chunks(batch_size).enumerate() {
        tracing::info!(batch = index + 1, of = batches, size = batch.len(), "processing batch");
        for group in batch.chunks(max_parallel) {
            run_group(sync, group).await;
        }
    }
}

async fn run_group(sync: &Synchronizer, group: &[WorkItem]) {
    let mut tasks = JoinSet::new();
    for (slot, item) in group.iter().enumerate() {
        let sync = sync.clone();
        let record = Arc::clone(&item.record);
        let target_exists = item.target_exists;
        tasks.spawn(async move {
            sync.synchronize(&record, target_exists).await;
            slot
        });
    }

    let mut reported = vec![false; group.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(slot) => reported[slot] = true,
            Err(join_error) => {
                tracing::error!(error = %join_error, "synchronization task join error");
            }
        }
    }

    // A panicked task never reached the aggregator.
    for (item, _) in group.iter().zip(reported).filter(|(_, done)| !done) {
        sync.report_aborted(&item.record, "task panicked before reporting an outcome");
    }
}
