//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunable wiring for a scheduler instance, loadable from TOML.
///
/// Every field has a default, so an empty file (or no file at all) yields
/// the stock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds an advertisement stays live without being refreshed.
    #[serde(default = "default_expiry_secs")]
    pub advertisement_expiry_secs: u64,
    /// Subject executors advertise capacity on.
    #[serde(default = "default_advertise_subject")]
    pub advertise_subject: String,
    /// Subject executors announce shutdown on.
    #[serde(default = "default_shutdown_subject")]
    pub shutdown_subject: String,
}

fn default_expiry_secs() -> u64 {
    10
}

fn default_advertise_subject() -> String {
    "executor.advertise".to_string()
}

fn default_shutdown_subject() -> String {
    "executor.shutdown".to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            advertisement_expiry_secs: default_expiry_secs(),
            advertise_subject: default_advertise_subject(),
            shutdown_subject: default_shutdown_subject(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn advertisement_expiry(&self) -> Duration {
        Duration::from_secs(self.advertisement_expiry_secs)
    }
}
