//! In-process store that records every call.
//!
//! Failures can be injected per uid or per kind, deleted uids can be made to
//! linger for a number of probes, and an artificial latency lets callers
//! observe how many operations overlap. With [`MemoryStore::with_folder_cascade`]
//! a folder delete takes its dashboards with it, as Grafana does.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use mirror_core::{ResourceKind, ResourceRecord, Uid};

use crate::error::StoreError;
use crate::InventoryStore;

/// One call observed by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List(ResourceKind),
    Fetch(ResourceKind, Uid),
    Create(ResourceKind, Uid),
    Delete(ResourceKind, Uid),
}

impl StoreCall {
    /// Whether this call changes store contents.
    pub fn is_mutation(&self) -> bool {
        matches!(self, StoreCall::Create(..) | StoreCall::Delete(..))
    }
}

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<(ResourceKind, Uid), Value>,
    calls: Vec<StoreCall>,
    failing_lists: HashSet<ResourceKind>,
    failing_creates: HashSet<Uid>,
    failing_deletes: HashSet<Uid>,
    /// Remaining fetch probes that still report a deleted uid as present.
    lingering: HashMap<Uid, u32>,
    linger_after_delete: HashMap<Uid, u32>,
    cascade_folder_deletes: bool,
}

/// Thread-safe in-memory [`InventoryStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `uids` of `kind` (payload `{"uid": ..}`).
    pub fn with_uids<'a>(kind: ResourceKind, uids: impl IntoIterator<Item = &'a str>) -> Self {
        let store = Self::new();
        for uid in uids {
            store.insert(kind, Uid::from(uid), serde_json::json!({ "uid": uid }));
        }
        store
    }

    /// Delay every non-list call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Deleting a folder also deletes the dashboards placed in it.
    pub fn with_folder_cascade(self) -> Self {
        self.lock().cascade_folder_deletes = true;
        self
    }

    pub fn insert(&self, kind: ResourceKind, uid: Uid, payload: Value) {
        self.lock().items.insert((kind, uid), payload);
    }

    pub fn fail_list(&self, kind: ResourceKind) {
        self.lock().failing_lists.insert(kind);
    }

    pub fn fail_create(&self, uid: &str) {
        self.lock().failing_creates.insert(Uid::from(uid));
    }

    pub fn fail_delete(&self, uid: &str) {
        self.lock().failing_deletes.insert(Uid::from(uid));
    }

    /// After `uid` is deleted, report it as present for the next `probes` fetches.
    pub fn linger_after_delete(&self, uid: &str, probes: u32) {
        self.lock()
            .linger_after_delete
            .insert(Uid::from(uid), probes);
    }

    /// Uids of `kind` currently stored, sorted.
    pub fn uids(&self, kind: ResourceKind) -> Vec<Uid> {
        self.lock()
            .items
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, uid)| uid.clone())
            .collect()
    }

    pub fn payload(&self, kind: ResourceKind, uid: &str) -> Option<Value> {
        self.lock().items.get(&(kind, Uid::from(uid))).cloned()
    }

    /// Every call in arrival order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Create and delete calls in arrival order.
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_mutation).collect()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: StoreCall) {
        self.lock().calls.push(call);
    }

    async fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        InFlight(&self.in_flight)
    }
}

/// Folder uid a dashboard payload is placed in.
fn folder_of(payload: &Value) -> Option<&str> {
    payload
        .pointer("/meta/folderUid")
        .or_else(|| payload.get("folderUid"))
        .and_then(Value::as_str)
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Uid>, StoreError> {
        self.record(StoreCall::List(kind));
        if self.lock().failing_lists.contains(&kind) {
            return Err(StoreError::Rejected {
                op: "list",
                reason: format!("{kind} inventory unavailable"),
            });
        }
        Ok(self.uids(kind))
    }

    async fn fetch(&self, kind: ResourceKind, uid: &Uid) -> Result<Option<Value>, StoreError> {
        self.record(StoreCall::Fetch(kind, uid.clone()));
        let _guard = self.enter().await;
        let mut state = self.lock();
        if let Some(remaining) = state.lingering.get_mut(uid) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(Some(serde_json::json!({ "uid": uid.as_str() })));
            }
        }
        Ok(state.items.get(&(kind, uid.clone())).cloned())
    }

    async fn create(&self, record: &ResourceRecord) -> Result<Uid, StoreError> {
        self.record(StoreCall::Create(record.kind, record.uid.clone()));
        let _guard = self.enter().await;
        let mut state = self.lock();
        if state.failing_creates.contains(&record.uid) {
            return Err(StoreError::Rejected {
                op: "create",
                reason: format!("injected failure for {}", record.uid),
            });
        }
        let key = (record.kind, record.uid.clone());
        if state.items.contains_key(&key) {
            return Err(StoreError::Rejected {
                op: "create",
                reason: format!("{} {} already exists", record.kind, record.uid),
            });
        }
        state.lingering.remove(&record.uid);
        state.items.insert(key, record.payload.clone());
        Ok(record.uid.clone())
    }

    async fn delete(&self, kind: ResourceKind, uid: &Uid) -> Result<(), StoreError> {
        self.record(StoreCall::Delete(kind, uid.clone()));
        let _guard = self.enter().await;
        let mut state = self.lock();
        if state.failing_deletes.contains(uid) {
            return Err(StoreError::Rejected {
                op: "delete",
                reason: format!("injected failure for {uid}"),
            });
        }
        if state.items.remove(&(kind, uid.clone())).is_none() {
            return Err(StoreError::NotFound {
                op: "delete",
                kind,
                uid: uid.clone(),
            });
        }
        if kind == ResourceKind::Folder && state.cascade_folder_deletes {
            state.items.retain(|(k, _), payload| {
                *k != ResourceKind::Dashboard || folder_of(payload) != Some(uid.as_str())
            });
        }
        if let Some(probes) = state.linger_after_delete.get(uid).copied() {
            state.lingering.insert(uid.clone(), probes);
        }
        Ok(())
    }
}
