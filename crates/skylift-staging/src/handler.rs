//! StagingCompletionHandler — the guarded run-or-fail transition.
//!
//! Exactly one transition happens per staging task: events for unknown
//! applications or superseded tasks are dropped, malformed success
//! payloads are dropped without failing the application, and a validated
//! success persists the detected metadata before triggering exactly one
//! execution path.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use skylift_bus::MessageBus;

use crate::backend::{
    AppSnapshot, ApplicationDirectory, DesireBackend, InstanceLauncher, OperatorEventSink,
};
use crate::messages::{StagingFailure, StagingOutcome, StagingSuccess};

/// Subject the build/staging subsystem publishes completions on.
pub const STAGING_FINISHED_SUBJECT: &str = "staging.finished";

#[derive(Clone)]
pub struct StagingCompletionHandler {
    apps: Arc<dyn ApplicationDirectory>,
    desire: Arc<dyn DesireBackend>,
    launcher: Arc<dyn InstanceLauncher>,
    operator_events: Arc<dyn OperatorEventSink>,
}

impl StagingCompletionHandler {
    pub fn new(
        apps: Arc<dyn ApplicationDirectory>,
        desire: Arc<dyn DesireBackend>,
        launcher: Arc<dyn InstanceLauncher>,
        operator_events: Arc<dyn OperatorEventSink>,
    ) -> Self {
        Self {
            apps,
            desire,
            launcher,
            operator_events,
        }
    }

    /// Subscribe to the staging-completion subject on `bus`.
    pub async fn register_subscriptions(&self, bus: &dyn MessageBus) {
        let handler = self.clone();
        bus.subscribe(
            STAGING_FINISHED_SUBJECT,
            Arc::new(move |payload| {
                let handler = handler.clone();
                Box::pin(async move { handler.handle_completion(payload).await })
            }),
        )
        .await;
    }

    /// Process one staging-completion payload.
    pub async fn handle_completion(&self, payload: Value) {
        debug!(%payload, "staging completion received");

        match StagingOutcome::parse(&payload) {
            Ok(StagingOutcome::Failure(failure)) => self.handle_failure(failure).await,
            Ok(StagingOutcome::Success(success)) => self.handle_success(success).await,
            Err(err) => warn!(%payload, error = %err, "staging payload dropped"),
        }
    }

    async fn handle_failure(&self, failure: StagingFailure) {
        let Some(app) = self.current_app(&failure.app_id, &failure.task_id).await else {
            return;
        };

        if let Err(err) = self.apps.mark_failed_to_stage(&app.app_id).await {
            error!(app_id = %app.app_id, error = %err, "could not record staging failure");
            return;
        }

        self.operator_events.emit_error(
            &app.app_id,
            &format!("Failed to stage application: {}", failure.error),
        );
    }

    async fn handle_success(&self, success: StagingSuccess) {
        let Some(app) = self.current_app(&success.app_id, &success.task_id).await else {
            return;
        };

        if let Err(err) = self
            .apps
            .update_detected_buildpack(&app.app_id, &success.detected_buildpack, &success.buildpack_key)
            .await
        {
            error!(app_id = %app.app_id, error = %err, "could not persist detected buildpack");
            return;
        }
        if let Err(err) = self
            .apps
            .update_start_command(&app.app_id, success.detected_start_command.as_deref())
            .await
        {
            error!(app_id = %app.app_id, error = %err, "could not persist start command");
            return;
        }

        if self.desire.accepts(&app).await {
            if let Err(err) = self.desire.submit_desire(&app).await {
                error!(app_id = %app.app_id, error = %err, "desire request failed");
                self.operator_events
                    .emit_error(&app.app_id, &format!("Failed to run application: {err}"));
            }
        } else {
            self.launch(&app).await;
        }
    }

    async fn launch(&self, app: &AppSnapshot) {
        match self.launcher.start_instances(app, app.instance_count).await {
            Ok(placed) if placed < app.instance_count => {
                warn!(
                    app_id = %app.app_id,
                    placed,
                    requested = app.instance_count,
                    "insufficient capacity to start every instance"
                );
            }
            Ok(placed) => debug!(app_id = %app.app_id, placed, "instances started"),
            Err(err) => {
                error!(app_id = %app.app_id, error = %err, "instance launch failed");
                self.operator_events
                    .emit_error(&app.app_id, &format!("Failed to run application: {err}"));
            }
        }
    }

    /// Resolve the application and enforce the idempotency guards.
    async fn current_app(&self, app_id: &str, task_id: &str) -> Option<AppSnapshot> {
        let Some(app) = self.apps.find(app_id).await else {
            info!(%app_id, "staging completion for unknown application");
            return None;
        };

        if app.staging_task_id.as_deref() != Some(task_id) {
            info!(
                %app_id,
                %task_id,
                current = ?app.staging_task_id,
                "staging completion for superseded task"
            );
            return None;
        }

        Some(app)
    }
}
