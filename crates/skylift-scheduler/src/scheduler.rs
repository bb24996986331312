//! PlacementScheduler — bus ingestion and the find/reserve contract.
//!
//! The scheduler owns an `AdvertisementStore` and exposes the two halves
//! of the placement protocol: the bus-delivery path (advertise, shutdown)
//! mutates the store; the query path (`find_executor`, `reserve`,
//! `record_instance_started`) snapshots and books against it. Malformed
//! bus payloads are logged and dropped, leaving the store unchanged.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{info, warn};

use skylift_bus::MessageBus;
use skylift_placement::{PlacementRequest, select_executor};
use skylift_pool::{AdvertisementMessage, AdvertisementStore, ExecutorId, ShutdownMessage};

use crate::config::SchedulerConfig;

#[derive(Clone)]
pub struct PlacementScheduler {
    store: AdvertisementStore,
    config: SchedulerConfig,
}

impl PlacementScheduler {
    /// Wrap an existing store with the default configuration.
    pub fn new(store: AdvertisementStore) -> Self {
        Self {
            store,
            config: SchedulerConfig::default(),
        }
    }

    /// Wrap an existing store with an explicit configuration.
    ///
    /// The store keeps its own expiry window; use `from_config` when the
    /// configured expiry should apply.
    pub fn with_config(store: AdvertisementStore, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    /// Build a scheduler and its store from configuration alone.
    pub fn from_config(config: SchedulerConfig) -> Self {
        let store = AdvertisementStore::new().with_expiry(config.advertisement_expiry());
        Self { store, config }
    }

    /// The shared advertisement store, for wiring and diagnostics.
    pub fn store(&self) -> &AdvertisementStore {
        &self.store
    }

    /// Subscribe the advertise and shutdown subjects on `bus`.
    pub async fn register_subscriptions(&self, bus: &dyn MessageBus) {
        let scheduler = self.clone();
        bus.subscribe(
            &self.config.advertise_subject,
            Arc::new(move |payload| {
                let scheduler = scheduler.clone();
                Box::pin(async move { scheduler.process_advertisement(payload).await })
            }),
        )
        .await;

        let scheduler = self.clone();
        bus.subscribe(
            &self.config.shutdown_subject,
            Arc::new(move |payload| {
                let scheduler = scheduler.clone();
                Box::pin(async move { scheduler.process_shutdown(payload).await })
            }),
        )
        .await;
    }

    /// Ingest one advertisement payload.
    pub async fn process_advertisement(&self, payload: Value) {
        let message = match AdvertisementMessage::parse(&payload) {
            Ok(message) => message,
            Err(err) => {
                warn!(%payload, error = %err, "advertisement dropped");
                return;
            }
        };

        let now = Instant::now();
        self.store.upsert(message.into_advertisement(now)).await;
        self.store.prune_expired(now).await;
    }

    /// Ingest one shutdown payload.
    pub async fn process_shutdown(&self, payload: Value) {
        match ShutdownMessage::parse(&payload) {
            Ok(message) => {
                if self.store.remove(&message.executor_id).await {
                    info!(executor_id = %message.executor_id, "executor shut down");
                }
            }
            Err(err) => warn!(%payload, error = %err, "shutdown notice dropped"),
        }
    }

    /// Select the best executor for `request`, or `None`.
    ///
    /// Pure orchestration: snapshot the live advertisements and run the
    /// eligibility pipeline. No side effects beyond the read; "no match"
    /// is a result, not an error.
    pub async fn find_executor(&self, request: &PlacementRequest) -> Option<ExecutorId> {
        let snapshot = self.store.snapshot(Instant::now()).await;
        select_executor(snapshot, request)
    }

    /// Claim memory on an executor right after placing an instance there.
    ///
    /// Immediately visible to the next `find_executor`, so a burst of
    /// placements cannot double-book an executor between advertisement
    /// refreshes.
    pub async fn reserve(&self, executor_id: &str, memory: u64) {
        self.store.apply_reservation(executor_id, memory).await;
    }

    /// Book a started instance against the executor's advertisement.
    pub async fn record_instance_started(&self, executor_id: &str, app_id: &str) {
        self.store.record_instance_started(executor_id, app_id).await;
    }
}
