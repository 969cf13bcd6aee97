//! Status API Handlers
//!
//! Endpoints the runner calls on every stage and step transition.

use axum::{Json, extract::State, http::StatusCode};
use stagehand_core::dto::status::{ResetRequest, StatusUpdate};

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::status_service;

/// PATCH /stage/status
pub async fn update_stage_status(
    State(state): State<AppState>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<StatusCode> {
    status_service::update_stage_status(&state.pool, &update).await?;
    state.notifier.notify();

    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /step/status
pub async fn update_step_status(
    State(state): State<AppState>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<StatusCode> {
    status_service::update_step_status(&state.pool, &update).await?;
    state.notifier.notify();

    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /stage/status/reset
pub async fn reset_step_statuses(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> ApiResult<StatusCode> {
    status_service::reset_step_statuses(&state.pool, &req).await?;
    state.notifier.notify();

    Ok(StatusCode::NO_CONTENT)
}
