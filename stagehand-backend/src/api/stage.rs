//! Stage API Handlers
//!
//! HTTP endpoints for stage registration, listing and deletion.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use stagehand_core::domain::stage::Stage;
use stagehand_core::dto::log::LogRecord;
use stagehand_core::dto::stage::SaveStage;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::stage_service;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub pipeline_file: Option<String>,
}

/// GET /stages[?pipelineFile=]
pub async fn list_stages(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Stage>>> {
    tracing::debug!("Listing stages (pipeline file: {:?})", query.pipeline_file);

    let stages = stage_service::list_stages(&state.pool, query.pipeline_file.as_deref()).await?;
    Ok(Json(stages))
}

/// GET /stage/{key}
/// A numeric key is a stage id and yields one stage; anything else is a
/// pipeline file and yields its stages.
pub async fn get_stage(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    match key.parse::<i64>() {
        Ok(id) => {
            tracing::debug!("Getting stage: {}", id);
            let stage = stage_service::get_stage(&state.pool, id).await?;
            Ok(Json(to_json(&stage)?))
        }
        Err(_) => {
            tracing::debug!("Getting stages of pipeline: {}", key);
            let stages = stage_service::list_stages(&state.pool, Some(&key)).await?;
            Ok(Json(to_json(&stages)?))
        }
    }
}

/// GET /stage/{id}/logs
pub async fn stage_logs(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<LogRecord>>> {
    let records = stage_service::stage_logs(&state.pool, &state.logs, id).await?;
    Ok(Json(records))
}

/// POST /stages
/// Create or update stages with their steps
pub async fn save_stages(
    State(state): State<AppState>,
    Json(stages): Json<Vec<SaveStage>>,
) -> ApiResult<(StatusCode, Json<Vec<Stage>>)> {
    tracing::info!("Saving {} stage(s)", stages.len());

    let saved = stage_service::save_stages(&state.pool, stages).await?;
    state.notifier.notify();

    Ok((StatusCode::CREATED, Json(saved)))
}

/// DELETE /stages/{id}
pub async fn delete_stage(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting stage: {}", id);

    stage_service::delete_stage(&state.pool, &state.logs, id).await?;
    state.notifier.notify();

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /stages
pub async fn delete_all_stages(State(state): State<AppState>) -> ApiResult<StatusCode> {
    tracing::info!("Deleting all stages");

    stage_service::delete_all_stages(&state.pool, &state.logs).await?;
    state.notifier.notify();

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /pipeline/{pipeline_file}
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Path(pipeline_file): Path<String>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting pipeline: {}", pipeline_file);

    stage_service::delete_pipeline(&state.pool, &state.logs, &pipeline_file).await?;
    state.notifier.notify();

    Ok(StatusCode::NO_CONTENT)
}

fn to_json<T: serde::Serialize>(value: &T) -> ApiResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| crate::api::error::ApiError::InternalError(e.to_string()))
}
