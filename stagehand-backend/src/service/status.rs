//! Status Service
//!
//! Status transitions reported by the runner. Stages and steps are addressed
//! by `(pipeline_file, stage_name[, step_name])`. A transition for an
//! unknown stage or step touches nothing and is not an error.

use sqlx::SqlitePool;
use stagehand_core::domain::status::Status;
use stagehand_core::dto::status::{ResetRequest, StatusUpdate};

use crate::repository::{stage_repository, step_repository};
use crate::service::{Result, StageError};

/// Apply a stage status update. Returns the number of rows touched.
pub async fn update_stage_status(pool: &SqlitePool, update: &StatusUpdate) -> Result<u64> {
    let status = Status::from_label(&update.status);
    let mut tx = pool.begin().await?;

    let touched = stage_repository::update_status(
        &mut tx,
        &update.pipeline_file,
        &update.stage_name,
        status,
        chrono::Utc::now(),
    )
    .await?;

    tx.commit().await?;

    log_transition(update, None, status, touched);
    Ok(touched)
}

/// Apply a step status update. Returns the number of rows touched.
pub async fn update_step_status(pool: &SqlitePool, update: &StatusUpdate) -> Result<u64> {
    let step_name = update
        .step_name
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StageError::ValidationError("stepName is required".to_string()))?;
    let status = Status::from_label(&update.status);
    let mut tx = pool.begin().await?;

    let touched = step_repository::update_status(
        &mut tx,
        &update.pipeline_file,
        &update.stage_name,
        step_name,
        status,
        chrono::Utc::now(),
    )
    .await?;

    tx.commit().await?;

    log_transition(update, Some(step_name), status, touched);
    Ok(touched)
}

/// Put every step of a stage back to `none`. The stage status is untouched.
pub async fn reset_step_statuses(pool: &SqlitePool, req: &ResetRequest) -> Result<u64> {
    let mut tx = pool.begin().await?;

    let touched = step_repository::reset_for_stage(
        &mut tx,
        &req.pipeline_file,
        &req.stage_name,
        chrono::Utc::now(),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        "Reset {} step(s) of {}/{}",
        touched,
        req.pipeline_file,
        req.stage_name
    );
    Ok(touched)
}

fn log_transition(update: &StatusUpdate, step: Option<&str>, status: Status, touched: u64) {
    let target = match step {
        Some(step) => format!("{}/{}/{}", update.pipeline_file, update.stage_name, step),
        None => format!("{}/{}", update.pipeline_file, update.stage_name),
    };

    if touched == 0 {
        tracing::debug!("No row for {}, status {} ignored", target, status);
    } else {
        tracing::info!("{} -> {}", target, status);
    }
}
