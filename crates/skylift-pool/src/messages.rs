//! Bus wire messages for the executor pool.
//!
//! Payloads arrive as JSON objects; unknown keys are ignored. A payload
//! failing shape or type validation is a parse error the ingestion path
//! logs and drops — it never changes stored state.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;

use crate::advertisement::{Advertisement, DEFAULT_ZONE, FeatureValue};

/// Errors from decoding a bus payload.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed bus message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// An inbound capacity advertisement.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvertisementMessage {
    pub executor_id: String,
    pub stacks: Vec<String>,
    pub available_memory: u64,
    /// Executors that do not report disk are treated as unbounded.
    #[serde(default = "unbounded_disk")]
    pub available_disk: u64,
    pub app_id_to_count: HashMap<String, u32>,
    #[serde(default)]
    pub placement_zone: Option<String>,
    #[serde(default, rename = "dea_features")]
    pub features: Option<HashMap<String, FeatureValue>>,
}

fn unbounded_disk() -> u64 {
    u64::MAX
}

impl AdvertisementMessage {
    pub fn parse(payload: &serde_json::Value) -> Result<Self, MessageError> {
        Ok(serde_json::from_value(payload.clone())?)
    }

    /// Build the stored form, stamping the receipt time.
    pub fn into_advertisement(self, received_at: Instant) -> Advertisement {
        Advertisement {
            executor_id: self.executor_id,
            stacks: self.stacks,
            available_memory: self.available_memory,
            available_disk: self.available_disk,
            app_counts: self.app_id_to_count,
            zone: self.placement_zone.unwrap_or_else(|| DEFAULT_ZONE.to_string()),
            features: self.features,
            received_at,
        }
    }
}

/// An inbound executor shutdown notice. Every field other than the
/// executor id is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownMessage {
    pub executor_id: String,
}

impl ShutdownMessage {
    pub fn parse(payload: &serde_json::Value) -> Result<Self, MessageError> {
        Ok(serde_json::from_value(payload.clone())?)
    }
}
