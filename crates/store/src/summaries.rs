//! Summary Store: one current summary and one run marker per tier.
//!
//! Layout: `summaries/<tier>` and `runMarkers/<tier>`. Writes overwrite.
//! Each tier also owns an async lock so regenerations of the same tier
//! are serialized; callers re-check the due rule while holding it.

use dayloop_core::error::StoreError;
use dayloop_core::store::KvStore;
use dayloop_core::summary::{PeriodSummary, RunMarker, Tier};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

pub struct SummaryStore {
    store: Arc<dyn KvStore>,
    locks: [Arc<Mutex<()>>; Tier::ALL.len()],
}

impl SummaryStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            locks: std::array::from_fn(|_| Arc::new(Mutex::new(()))),
        }
    }

    pub fn summary_key(tier: Tier) -> String {
        format!("summaries/{tier}")
    }

    pub fn marker_key(tier: Tier) -> String {
        format!("runMarkers/{tier}")
    }

    /// Take the single-writer lock for `tier`.
    pub async fn lock_tier(&self, tier: Tier) -> OwnedMutexGuard<()> {
        self.locks[tier as usize].clone().lock_owned().await
    }

    /// The most recent summary at `tier`.
    pub async fn get(&self, tier: Tier) -> Result<Option<PeriodSummary>, StoreError> {
        read(self.store.as_ref(), &Self::summary_key(tier)).await
    }

    pub async fn put(&self, summary: &PeriodSummary) -> Result<(), StoreError> {
        debug!(tier = %summary.tier, "Storing summary");
        write(self.store.as_ref(), &Self::summary_key(summary.tier), summary).await
    }

    pub async fn run_marker(&self, tier: Tier) -> Result<Option<RunMarker>, StoreError> {
        read(self.store.as_ref(), &Self::marker_key(tier)).await
    }

    pub async fn set_run_marker(&self, marker: &RunMarker) -> Result<(), StoreError> {
        write(self.store.as_ref(), &Self::marker_key(marker.tier), marker).await
    }

    /// Every stored summary, lowest tier first.
    pub async fn all(&self) -> Result<Vec<PeriodSummary>, StoreError> {
        let mut summaries = Vec::new();
        for tier in Tier::ALL {
            if let Some(summary) = self.get(tier).await? {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }
}

async fn read<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

async fn write<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> Result<(), StoreError> {
    let value = serde_json::to_value(value).map_err(|e| StoreError::Storage(e.to_string()))?;
    store.put(key, value).await
}
