//! Wait for a delete to become visible before recreating the same uid.

use std::time::Duration;

use mirror_core::{ConsistencyConfig, ResourceKind, Uid};
use mirror_store::InventoryStore;

/// Poll-until-absent settings applied after a successful delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyPolicy {
    pub poll_interval: Duration,
    /// Presence probes after the first pause; 0 means a single fixed delay.
    pub max_polls: u32,
}

impl Default for ConsistencyPolicy {
    fn default() -> Self {
        Self::from(&ConsistencyConfig::default())
    }
}

impl From<&ConsistencyConfig> for ConsistencyPolicy {
    fn from(config: &ConsistencyConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_polls: config.max_polls,
        }
    }
}

/// Result of [`ConsistencyPolicy::wait_until_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    /// A probe saw the uid gone.
    Absent,
    /// Only the fixed delay was applied.
    Paced,
    /// The uid was still present after the last probe.
    StillPresent,
    /// The presence probe failed.
    ProbeFailed(String),
}

impl ConsistencyPolicy {
    /// No pause and no probes.
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            max_polls: 0,
        }
    }

    /// Sleep, then ask the store whether `uid` is gone, up to `max_polls` times.
    ///
    /// Never fails: the caller creates the resource whatever the result.
    pub async fn wait_until_absent(
        &self,
        store: &dyn InventoryStore,
        kind: ResourceKind,
        uid: &Uid,
    ) -> Settled {
        if self.max_polls == 0 {
            pause(self.poll_interval).await;
            return Settled::Paced;
        }
        for attempt in 1..=self.max_polls {
            pause(self.poll_interval).await;
            match store.fetch(kind, uid).await {
                Ok(None) => return Settled::Absent,
                Ok(Some(_)) => {
                    tracing::debug!(%kind, %uid, attempt, "deleted resource still visible");
                }
                Err(err) => return Settled::ProbeFailed(err.to_string()),
            }
        }
        Settled::StillPresent
    }
}

async fn pause(interval: Duration) {
    if !interval.is_zero() {
        tokio::time::sleep(interval).await;
    }
}
