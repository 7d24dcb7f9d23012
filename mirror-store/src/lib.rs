//! # mirror-store
//!
//! Client seam for the store being reconciled.
//!
//! [`InventoryStore`] is the only surface the sync engine talks to.
//! [`HttpStore`] speaks the Grafana HTTP API of a tenant; [`MemoryStore`]
//! keeps everything in process and records each call.

pub mod error;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use mirror_core::{ResourceKind, ResourceRecord, Uid};

pub use error::StoreError;
pub use http::HttpStore;
pub use memory::{MemoryStore, StoreCall};

/// List / get / create / delete by uid, per resource kind.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Every uid of `kind` currently present.
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Uid>, StoreError>;

    /// The stored payload for `uid`, or `None` when it does not exist.
    async fn fetch(&self, kind: ResourceKind, uid: &Uid) -> Result<Option<Value>, StoreError>;

    /// Create `record`, returning the uid the store assigned.
    async fn create(&self, record: &ResourceRecord) -> Result<Uid, StoreError>;

    async fn delete(&self, kind: ResourceKind, uid: &Uid) -> Result<(), StoreError>;
}
