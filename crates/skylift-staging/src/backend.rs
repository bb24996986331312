//! Collaborator seams for the staging transition.
//!
//! The handler mutates application state and triggers execution only
//! through these traits; the control plane wires in the real
//! implementations (persistence, backend clients, log emission).

use async_trait::async_trait;

/// Read snapshot of the application fields the staging transition needs.
#[derive(Debug, Clone)]
pub struct AppSnapshot {
    pub app_id: String,
    /// The application's current outstanding staging task, if any.
    pub staging_task_id: Option<String>,
    /// Configured number of instances to run.
    pub instance_count: u32,
    /// Memory per instance in MB.
    pub memory_mb: u64,
    /// Disk per instance in MB.
    pub disk_mb: u64,
    /// Runtime stack the application is built for.
    pub stack: String,
    pub org_id: String,
    pub space_id: String,
}

/// Lookup and mutation of application entities.
#[async_trait]
pub trait ApplicationDirectory: Send + Sync {
    async fn find(&self, app_id: &str) -> Option<AppSnapshot>;

    async fn mark_failed_to_stage(&self, app_id: &str) -> anyhow::Result<()>;

    async fn update_detected_buildpack(
        &self,
        app_id: &str,
        detected_buildpack: &str,
        buildpack_key: &str,
    ) -> anyhow::Result<()>;

    /// Update the current build artifact's start command. `None` clears it.
    async fn update_start_command(
        &self,
        app_id: &str,
        start_command: Option<&str>,
    ) -> anyhow::Result<()>;
}

/// The direct-desire execution backend.
#[async_trait]
pub trait DesireBackend: Send + Sync {
    /// Does this application's target backend accept desire requests?
    async fn accepts(&self, app: &AppSnapshot) -> bool;

    /// Ask the backend to ensure the application's instances are running.
    async fn submit_desire(&self, app: &AppSnapshot) -> anyhow::Result<()>;
}

/// The placement-based execution path: start `count` instances.
#[async_trait]
pub trait InstanceLauncher: Send + Sync {
    /// Returns how many instances were actually placed and started.
    async fn start_instances(&self, app: &AppSnapshot, count: u32) -> anyhow::Result<u32>;
}

/// Operator-facing error emission, tagged with the application id.
pub trait OperatorEventSink: Send + Sync {
    fn emit_error(&self, app_id: &str, message: &str);
}
