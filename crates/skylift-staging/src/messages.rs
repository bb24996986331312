//! Staging-completion payload schema.
//!
//! A payload carrying a non-null `error` key reports a failed staging
//! attempt; anything else must match the success schema. Payloads failing
//! validation are dropped by the handler — a malformed message is never
//! an application failure.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StagingMessageError {
    #[error("malformed staging payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A failed staging attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct StagingFailure {
    pub app_id: String,
    pub task_id: String,
    pub error: String,
}

/// A successful staging attempt, with the detected build metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct StagingSuccess {
    pub app_id: String,
    pub task_id: String,
    pub buildpack_key: String,
    pub detected_buildpack: String,
    #[serde(default)]
    pub detected_start_command: Option<String>,
}

/// A decoded staging-completion event.
#[derive(Debug, Clone)]
pub enum StagingOutcome {
    Failure(StagingFailure),
    Success(StagingSuccess),
}

impl StagingOutcome {
    /// Decode a bus payload, dispatching on the presence of `error`.
    pub fn parse(payload: &Value) -> Result<Self, StagingMessageError> {
        let failed = payload.get("error").is_some_and(|v| !v.is_null());
        if failed {
            Ok(Self::Failure(serde_json::from_value(payload.clone())?))
        } else {
            Ok(Self::Success(serde_json::from_value(payload.clone())?))
        }
    }
}
