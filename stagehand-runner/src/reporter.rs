//! Status reporter
//!
//! Translates engine state transitions into status store updates. Calls are
//! awaited inline by the execer, so a slow store slows the run down instead
//! of queueing updates.

use std::path::PathBuf;

use async_trait::async_trait;
use stagehand_client::StatusClient;
use stagehand_core::dto::stage::SaveStage;
use stagehand_core::dto::status::StatusUpdate;
use tracing::debug;

use crate::error::ReportError;
use crate::state::{ExecStatus, State};

/// Observer of stage and step transitions
#[async_trait]
pub trait Reporter: Send + Sync {
    /// The stage status in `state` changed
    async fn report_stage(&self, state: &State) -> Result<(), ReportError>;

    /// The status of `step` in `state` changed
    async fn report_step(&self, state: &State, step: &str) -> Result<(), ReportError>;
}

#[derive(Debug, Clone)]
pub struct ReporterConfig {
    pub socket_path: PathBuf,
    pub pipeline_file: String,
}

/// Reporter backed by the status API
#[derive(Debug, Clone)]
pub struct StatusReporter {
    client: StatusClient,
    pipeline_file: String,
}

impl StatusReporter {
    pub fn new(config: ReporterConfig) -> Result<Self, ReportError> {
        let client = StatusClient::unix(&config.socket_path)?;
        Ok(Self::with_client(client, config.pipeline_file))
    }

    pub fn with_client(client: StatusClient, pipeline_file: impl Into<String>) -> Self {
        Self {
            client,
            pipeline_file: pipeline_file.into(),
        }
    }

    /// Register the stage and its steps so later updates find their rows
    pub async fn register(&self, stage: &SaveStage) -> Result<(), ReportError> {
        self.client.save_stages(std::slice::from_ref(stage)).await?;
        debug!("Registered stage {} of {}", stage.name, stage.pipeline_file);
        Ok(())
    }

    async fn patch_stage(&self, stage: &str, status: ExecStatus) -> Result<(), ReportError> {
        let update = StatusUpdate::stage(&self.pipeline_file, stage, status.as_str());
        debug!("Stage {} -> {}", stage, update.status);
        self.client.update_stage_status(&update).await?;
        Ok(())
    }
}

#[async_trait]
impl Reporter for StatusReporter {
    async fn report_stage(&self, state: &State) -> Result<(), ReportError> {
        self.patch_stage(&state.stage.name, state.stage.status).await
    }

    async fn report_step(&self, state: &State, step: &str) -> Result<(), ReportError> {
        let (index, step_state) =
            state
                .find_step(step)
                .ok_or_else(|| ReportError::UnknownStep {
                    stage: state.stage.name.clone(),
                    step: step.to_string(),
                })?;

        // The first step starting means the stage is running
        if index == 0 && step_state.status == ExecStatus::Running {
            self.patch_stage(&state.stage.name, ExecStatus::Running)
                .await?;
        }

        let update = StatusUpdate::step(
            &self.pipeline_file,
            &state.stage.name,
            &step_state.name,
            step_state.status.as_str(),
        );
        debug!(
            "Step {}/{} -> {}",
            state.stage.name, step_state.name, update.status
        );
        self.client.update_step_status(&update).await?;
        Ok(())
    }
}
