//! Status update DTOs
//!
//! A `StatusUpdate` is the unit the runner sends for every stage or step
//! transition. Applying the same update twice leaves the store unchanged
//! apart from its timestamps.

use serde::{Deserialize, Serialize};

/// Status change for a stage, or for one of its steps when `step_name` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub pipeline_file: String,
    pub stage_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(default)]
    pub status: String,
}

impl StatusUpdate {
    /// Update for the stage itself. An empty status is reported as `success`.
    pub fn stage(
        pipeline_file: impl Into<String>,
        stage_name: impl Into<String>,
        status: &str,
    ) -> Self {
        Self {
            pipeline_file: pipeline_file.into(),
            stage_name: stage_name.into(),
            step_name: None,
            status: normalize(status),
        }
    }

    /// Update for a step of the stage. An empty status is reported as `success`.
    pub fn step(
        pipeline_file: impl Into<String>,
        stage_name: impl Into<String>,
        step_name: impl Into<String>,
        status: &str,
    ) -> Self {
        Self {
            pipeline_file: pipeline_file.into(),
            stage_name: stage_name.into(),
            step_name: Some(step_name.into()),
            status: normalize(status),
        }
    }
}

/// Reset request: all steps of the stage go back to `none`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    pub pipeline_file: String,
    pub stage_name: String,
}

fn normalize(status: &str) -> String {
    if status.is_empty() {
        "success".to_string()
    } else {
        status.to_string()
    }
}
