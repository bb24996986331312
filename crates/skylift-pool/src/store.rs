//! AdvertisementStore — the expiring executor registry.
//!
//! Authoritative mapping from executor id to its most recent
//! advertisement. Writes come from the bus-ingestion path (upsert,
//! remove, prune); reads come from placement callers (snapshot) and are
//! copy-out, so a snapshot never observes a partially written entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::advertisement::{Advertisement, ExecutorId};

/// How long an advertisement stays live without being refreshed.
pub const ADVERTISEMENT_EXPIRY: Duration = Duration::from_secs(10);

/// Thread-safe registry of live advertisements.
///
/// `Clone` shares the underlying map, so the ingestion and query paths
/// can each hold the same store.
#[derive(Clone)]
pub struct AdvertisementStore {
    entries: Arc<RwLock<HashMap<ExecutorId, Advertisement>>>,
    expiry: Duration,
}

impl AdvertisementStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            expiry: ADVERTISEMENT_EXPIRY,
        }
    }

    /// Override the expiry window (for tests and non-default deployments).
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Insert or fully replace the entry for the advertisement's executor.
    ///
    /// Last-write-wins per executor id by arrival order; there is no
    /// defense against a delayed advertisement overwriting a fresher one.
    pub async fn upsert(&self, advertisement: Advertisement) {
        let mut entries = self.entries.write().await;
        debug!(executor_id = %advertisement.executor_id, "advertisement stored");
        entries.insert(advertisement.executor_id.clone(), advertisement);
    }

    /// Delete the entry if present. Idempotent; returns whether it existed.
    pub async fn remove(&self, executor_id: &str) -> bool {
        let mut entries = self.entries.write().await;
        let existed = entries.remove(executor_id).is_some();
        if existed {
            debug!(%executor_id, "advertisement removed");
        }
        existed
    }

    /// Copy-out of every advertisement still live at `now`.
    ///
    /// Pure read: expired entries are filtered, not deleted, so they
    /// linger in the map until the ingestion path prunes them, but they
    /// are never returned.
    pub async fn snapshot(&self, now: Instant) -> Vec<Advertisement> {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|ad| ad.is_fresh(now, self.expiry))
            .cloned()
            .collect()
    }

    /// Claim `memory` MB on an executor after placing an instance there.
    ///
    /// Saturating decrement of available memory; a no-op for unknown
    /// executors. The next real advertisement supersedes the claim.
    pub async fn apply_reservation(&self, executor_id: &str, memory: u64) {
        let mut entries = self.entries.write().await;
        if let Some(ad) = entries.get_mut(executor_id) {
            ad.available_memory = ad.available_memory.saturating_sub(memory);
            debug!(%executor_id, memory, remaining = ad.available_memory, "memory reserved");
        }
    }

    /// Bump the per-app instance count after starting an instance, so
    /// consecutive placements spread before the next advertisement lands.
    pub async fn record_instance_started(&self, executor_id: &str, app_id: &str) {
        let mut entries = self.entries.write().await;
        if let Some(ad) = entries.get_mut(executor_id) {
            *ad.app_counts.entry(app_id.to_string()).or_insert(0) += 1;
        }
    }

    /// Drop entries whose advertisement has expired at `now`.
    ///
    /// Returns how many were removed. Called from the ingestion path so
    /// abandoned executors do not accumulate; reads stay pure.
    pub async fn prune_expired(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, ad| ad.is_fresh(now, self.expiry));
        let pruned = before - entries.len();
        if pruned > 0 {
            debug!(pruned, "expired advertisements pruned");
        }
        pruned
    }

    /// Number of stored entries, live or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for AdvertisementStore {
    fn default() -> Self {
        Self::new()
    }
}
