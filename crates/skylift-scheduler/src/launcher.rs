//! PoolLauncher — the placement-based start path.
//!
//! When a staged application is not handled by the direct-desire backend,
//! its instances are started one by one: pick an executor through the
//! eligibility pipeline, book the capacity, and publish a start request
//! on the executor's start subject. Placement stops at the first
//! instance with no eligible executor; the caller learns how many were
//! actually placed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use skylift_bus::MessageBus;
use skylift_placement::{FeatureDirectory, PlacementRequest};
use skylift_staging::{AppSnapshot, InstanceLauncher};

use crate::scheduler::PlacementScheduler;

pub struct PoolLauncher {
    scheduler: PlacementScheduler,
    bus: Arc<dyn MessageBus>,
    /// Per-tenant feature requirements applied to every placement.
    features: Option<FeatureDirectory>,
}

impl PoolLauncher {
    pub fn new(scheduler: PlacementScheduler, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            scheduler,
            bus,
            features: None,
        }
    }

    pub fn with_features(mut self, features: FeatureDirectory) -> Self {
        self.features = Some(features);
        self
    }

    /// Subject an executor listens on for start requests.
    pub fn start_subject(executor_id: &str) -> String {
        format!("executor.{executor_id}.start")
    }

    fn placement_request(&self, app: &AppSnapshot) -> PlacementRequest {
        let mut request = PlacementRequest::new(
            &app.app_id,
            app.memory_mb,
            &app.stack,
            &app.org_id,
            &app.space_id,
        )
        .with_disk(app.disk_mb);
        if let Some(features) = &self.features {
            request = request.with_features(features.clone());
        }
        request
    }
}

#[async_trait]
impl InstanceLauncher for PoolLauncher {
    async fn start_instances(&self, app: &AppSnapshot, count: u32) -> anyhow::Result<u32> {
        let request = self.placement_request(app);
        let mut placed = 0;

        for index in 0..count {
            let Some(executor_id) = self.scheduler.find_executor(&request).await else {
                warn!(
                    app_id = %app.app_id,
                    placed,
                    requested = count,
                    "no eligible executor, stopping launch"
                );
                break;
            };

            self.scheduler.reserve(&executor_id, app.memory_mb).await;
            self.scheduler.record_instance_started(&executor_id, &app.app_id).await;
            self.bus
                .publish(
                    &Self::start_subject(&executor_id),
                    json!({"app_id": app.app_id, "index": index}),
                )
                .await;

            debug!(app_id = %app.app_id, %executor_id, index, "instance start requested");
            placed += 1;
        }

        Ok(placed)
    }
}
