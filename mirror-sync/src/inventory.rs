//! Inventory fetcher.

use mirror_core::{InventorySet, ResourceKind};
use mirror_store::InventoryStore;

use crate::error::SyncError;

/// List every uid of `kind` in the target.
///
/// Any failure is fatal for the run: callers must not issue a destructive
/// call when this returns an error.
pub async fn fetch_inventory(
    store: &dyn InventoryStore,
    kind: ResourceKind,
) -> Result<InventorySet, SyncError> {
    let uids = store
        .list(kind)
        .await
        .map_err(|source| SyncError::InventoryUnavailable { kind, source })?;
    let inventory = InventorySet::new(kind, uids);
    tracing::info!(%kind, count = inventory.len(), "fetched target inventory");
    Ok(inventory)
}
