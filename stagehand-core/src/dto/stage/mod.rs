//! Stage upsert DTOs

use serde::{Deserialize, Serialize};

use crate::domain::status::Status;

/// A stage to create or update, keyed by `(name, pipeline_file)`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStage {
    pub name: String,
    pub pipeline_file: String,
    #[serde(default)]
    pub pipeline_path: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub steps: Vec<SaveStep>,
}

/// A step to create or update within its stage, keyed by name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStep {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub err_ignore: bool,
}
