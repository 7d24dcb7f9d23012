//! Guard against wiping the target when the source came back empty.

use crate::diff::KindPlan;
use crate::error::SyncError;

/// Refuse a run whose source has no usable records while the target still
/// holds deletable resources, unless `allow_empty_source` is set.
pub fn check_mass_deletion(plans: &[KindPlan], allow_empty_source: bool) -> Result<(), SyncError> {
    let source: usize = plans.iter().map(KindPlan::valid_source_len).sum();
    let target: usize = plans.iter().map(|plan| plan.orphans.len()).sum();
    if source > 0 || target == 0 {
        return Ok(());
    }
    if allow_empty_source {
        tracing::warn!(resources = target, "source is empty; deleting every target resource as requested");
        return Ok(());
    }
    Err(SyncError::UnsafeMassDeletion { target })
}
