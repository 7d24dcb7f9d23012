//! Mirror core library: domain types, run configuration, errors.
//!
//! Public API surface:
//! - [`types`]: uids, resource kinds, records, inventories, outcomes
//! - [`config`]: [`MirrorConfig`] load / validate
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConsistencyConfig, MirrorConfig, TargetConfig};
pub use error::ConfigError;
pub use types::{
    InventorySet, ResourceKind, ResourceRecord, SyncOutcome, Uid, PROTECTED_FOLDER_UID,
};
