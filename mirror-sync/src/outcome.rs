//! Run verdict: success rate and exit status.

use serde::{Deserialize, Serialize};

use crate::stats::CounterTable;

/// Exit status for a run that met the tolerance gate.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status for a failed gate or an aborted run.
pub const EXIT_FAILURE: i32 = 1;

/// Aggregate outcome of a run, produced once at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub counts: CounterTable,
    /// Created + updated + deleted, orphan deletes included.
    pub succeeded: usize,
    pub failed: usize,
    /// Operations attempted (`succeeded + failed`).
    pub total: usize,
    pub success_rate: f64,
    pub threshold: f64,
    pub exit_code: i32,
}

impl RunResult {
    pub fn passed(&self) -> bool {
        self.exit_code == EXIT_SUCCESS
    }
}

/// Percentage of `total` operations that did not fail; 100 when nothing ran.
pub fn success_rate(total: usize, failed: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    total.saturating_sub(failed) as f64 * 100.0 / total as f64
}

/// 0 when nothing failed or the success rate reaches `threshold`, else 1.
pub fn exit_code(total: usize, failed: usize, threshold: f64) -> i32 {
    if failed == 0 || success_rate(total, failed) >= threshold {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Derive the run verdict from the final counter table.
pub fn evaluate(counts: CounterTable, threshold: f64) -> RunResult {
    let totals = counts.totals();
    let succeeded = totals.succeeded();
    let failed = totals.failed;
    let total = totals.total_operations();
    RunResult {
        succeeded,
        failed,
        total,
        success_rate: success_rate(total, failed),
        threshold,
        exit_code: exit_code(total, failed, threshold),
        counts,
    }
}
