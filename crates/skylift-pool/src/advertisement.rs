//! The `Advertisement` domain type.
//!
//! An advertisement is one executor's most recent self-reported capacity
//! snapshot. At most one lives in the store per executor id; a newer one
//! fully replaces the old (no field merging).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Unique identifier for an executor node.
pub type ExecutorId = String;

/// Unique identifier for a hosted application.
pub type AppId = String;

/// Zone assigned to executors that do not declare one.
pub const DEFAULT_ZONE: &str = "default";

/// A declared executor feature value: boolean or free-form string.
///
/// Equality is exact and typed: `Bool(true)` does not match `Text("true")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Text(String),
}

/// One executor's most recent capacity snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    pub executor_id: ExecutorId,
    /// Runtime stacks this executor can host.
    pub stacks: Vec<String>,
    /// Spare memory in MB.
    pub available_memory: u64,
    /// Spare disk in MB.
    pub available_disk: u64,
    /// Current instance count per application; absent entries read as zero.
    pub app_counts: HashMap<AppId, u32>,
    /// Placement zone, `DEFAULT_ZONE` when the executor declared none.
    pub zone: String,
    /// Declared feature set; `None` means no declared features.
    pub features: Option<HashMap<String, FeatureValue>>,
    /// Monotonic receipt time, stamped at ingestion.
    pub received_at: Instant,
}

impl Advertisement {
    /// Current instance count of `app_id` on this executor.
    pub fn instances_of(&self, app_id: &str) -> u32 {
        self.app_counts.get(app_id).copied().unwrap_or(0)
    }

    pub fn has_sufficient_disk(&self, required_disk: u64) -> bool {
        self.available_disk >= required_disk
    }

    /// Can this executor host an instance needing `memory` MB on `stack`?
    pub fn meets_needs(&self, memory: u64, stack: &str) -> bool {
        self.stacks.iter().any(|s| s == stack) && self.available_memory >= memory
    }

    /// Superset match against a required feature set.
    ///
    /// Every required (key, value) pair must be declared with an identical
    /// value. An executor with no declared features never matches a
    /// non-empty requirement; extra declared features are ignored.
    pub fn satisfies_features(&self, required: &HashMap<String, FeatureValue>) -> bool {
        if required.is_empty() {
            return true;
        }
        match &self.features {
            Some(declared) => required.iter().all(|(key, value)| declared.get(key) == Some(value)),
            None => false,
        }
    }

    /// Whether this advertisement is still live at `now`.
    pub fn is_fresh(&self, now: Instant, expiry: Duration) -> bool {
        now.duration_since(self.received_at) <= expiry
    }
}
