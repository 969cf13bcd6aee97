//! Status endpoints

use crate::StatusClient;
use crate::error::{ClientError, Result};
use stagehand_core::dto::status::{ResetRequest, StatusUpdate};

impl StatusClient {
    // =============================================================================
    // Status Updates
    // =============================================================================

    /// Report a stage status
    pub async fn update_stage_status(&self, update: &StatusUpdate) -> Result<()> {
        let url = self.url(&["stage", "status"])?;
        let response = self.client.patch(url).json(update).send().await?;

        self.handle_empty_response(response).await
    }

    /// Report a step status. The update must name the step.
    pub async fn update_step_status(&self, update: &StatusUpdate) -> Result<()> {
        if update.step_name.as_deref().is_none_or(str::is_empty) {
            return Err(ClientError::InvalidRequest(
                "step status update without a step name".to_string(),
            ));
        }

        let url = self.url(&["step", "status"])?;
        let response = self.client.patch(url).json(update).send().await?;

        self.handle_empty_response(response).await
    }

    /// Put every step of a stage back to `none`
    pub async fn reset_step_statuses(&self, req: &ResetRequest) -> Result<()> {
        let url = self.url(&["stage", "status", "reset"])?;
        let response = self.client.patch(url).json(req).send().await?;

        self.handle_empty_response(response).await
    }
}
