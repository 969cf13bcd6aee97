//! Stage and step domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::status::Status;

/// A named stage of a pipeline file, with its steps
///
/// Identity is `(name, pipeline_file)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: i64,
    pub name: String,
    pub pipeline_file: String,
    pub pipeline_path: String,
    pub status: Status,
    pub updated_at: DateTime<Utc>,
    /// Owned steps, ordered by step number
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A single container step of a stage
///
/// Identity is `(name, stage_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: i64,
    pub stage_id: i64,
    pub name: String,
    pub number: i64,
    pub image: String,
    pub status: Status,
    pub err_ignore: bool,
    pub updated_at: DateTime<Utc>,
}

impl Stage {
    /// Finds an owned step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}
