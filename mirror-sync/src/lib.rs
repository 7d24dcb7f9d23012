//! # mirror-sync
//!
//! Reconciliation engine: diff the source archive against the target
//! inventory, delete orphans, replace or create everything else under bounded
//! concurrency, and grade the run.
//!
//! Call [`pipeline::run`] for a real run or [`pipeline::plan`] for a dry run.

pub mod consistency;
pub mod diff;
pub mod error;
pub mod inventory;
pub mod outcome;
pub mod pipeline;
pub mod report;
pub mod safety;
pub mod scheduler;
pub mod stats;
pub mod synchronizer;

pub use consistency::ConsistencyPolicy;
pub use diff::{plan_kind, AlwaysReplace, KindPlan, UpdatePolicy, WorkItem};
pub use error::SyncError;
pub use inventory::fetch_inventory;
pub use outcome::{evaluate, RunResult, EXIT_FAILURE, EXIT_SUCCESS};
pub use pipeline::{plan, run, KindPlanSummary, RunOptions, RunPlan};
pub use report::{KindReport, ReportArtifacts, RunReport};
pub use scheduler::BatchPolicy;
pub use stats::{CounterTable, KindCounts, Stats};
pub use synchronizer::{FailedStep, FailureLog, FailureRecord, Synchronizer};
