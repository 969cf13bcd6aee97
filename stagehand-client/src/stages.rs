//! Stage endpoints

use crate::StatusClient;
use crate::error::Result;
use stagehand_core::domain::stage::Stage;
use stagehand_core::dto::log::LogRecord;
use stagehand_core::dto::stage::SaveStage;

impl StatusClient {
    // =============================================================================
    // Health
    // =============================================================================

    /// Check that the API answers
    pub async fn health(&self) -> Result<()> {
        let url = self.url(&["health"])?;
        let response = self.client.get(url).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Stage Management
    // =============================================================================

    /// List all stages with their steps
    pub async fn list_stages(&self) -> Result<Vec<Stage>> {
        let url = self.url(&["stages"])?;
        let response = self.client.get(url).send().await?;

        self.handle_response(response).await
    }

    /// List the stages of one pipeline file
    pub async fn list_stages_for(&self, pipeline_file: &str) -> Result<Vec<Stage>> {
        let url = self.url(&["stages"])?;
        let response = self
            .client
            .get(url)
            .query(&[("pipelineFile", pipeline_file)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a stage by ID
    pub async fn get_stage(&self, id: i64) -> Result<Stage> {
        let url = self.url(&["stage", &id.to_string()])?;
        let response = self.client.get(url).send().await?;

        self.handle_response(response).await
    }

    /// Get the stages of a pipeline file through the `/stage/{pipelineFile}` route
    pub async fn stages_by_pipeline_file(&self, pipeline_file: &str) -> Result<Vec<Stage>> {
        let url = self.url(&["stage", pipeline_file])?;
        let response = self.client.get(url).send().await?;

        self.handle_response(response).await
    }

    /// Create or update stages with their steps
    ///
    /// # Returns
    /// The stored stages, with their ids
    pub async fn save_stages(&self, stages: &[SaveStage]) -> Result<Vec<Stage>> {
        let url = self.url(&["stages"])?;
        let response = self.client.post(url).json(stages).send().await?;

        self.handle_response(response).await
    }

    /// Delete a stage, its steps and, if it was the last one, its pipeline's logs
    pub async fn delete_stage(&self, id: i64) -> Result<()> {
        let url = self.url(&["stages", &id.to_string()])?;
        let response = self.client.delete(url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Delete every stage and clear the logs directory
    pub async fn delete_all_stages(&self) -> Result<()> {
        let url = self.url(&["stages"])?;
        let response = self.client.delete(url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Delete every stage of a pipeline file and its logs
    pub async fn delete_pipeline(&self, pipeline_file: &str) -> Result<()> {
        let url = self.url(&["pipeline", pipeline_file])?;
        let response = self.client.delete(url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Log records of a stage's steps
    pub async fn stage_logs(&self, id: i64) -> Result<Vec<LogRecord>> {
        let url = self.url(&["stage", &id.to_string(), "logs"])?;
        let response = self.client.get(url).send().await?;

        self.handle_response(response).await
    }
}
