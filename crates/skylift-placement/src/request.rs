//! Placement request types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use skylift_pool::FeatureValue;

/// Required (key, value) feature pairs for one tenant space.
pub type FeatureSet = HashMap<String, FeatureValue>;

/// Per-tenant feature requirements, keyed organization → space.
pub type FeatureDirectory = HashMap<String, HashMap<String, FeatureSet>>;

/// An ephemeral placement query for one instance of an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub app_id: String,
    /// Memory the instance needs, in MB.
    pub required_memory: u64,
    /// Disk the instance needs, in MB.
    #[serde(default)]
    pub required_disk: u64,
    /// Runtime stack the instance runs on.
    pub stack: String,
    /// Organization of the requesting application.
    pub org_id: String,
    /// Space of the requesting application.
    pub space_id: String,
    /// Optional per-tenant feature requirements.
    #[serde(default)]
    pub feature_requirements: Option<FeatureDirectory>,
}

impl PlacementRequest {
    pub fn new(app_id: &str, required_memory: u64, stack: &str, org_id: &str, space_id: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            required_memory,
            required_disk: 0,
            stack: stack.to_string(),
            org_id: org_id.to_string(),
            space_id: space_id.to_string(),
            feature_requirements: None,
        }
    }

    pub fn with_disk(mut self, required_disk: u64) -> Self {
        self.required_disk = required_disk;
        self
    }

    pub fn with_features(mut self, directory: FeatureDirectory) -> Self {
        self.feature_requirements = Some(directory);
        self
    }
}
