//! API Module
//!
//! HTTP API layer of the status store.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod stage;
pub mod status;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch},
};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::logs::LogStore;
use crate::notify::RefreshNotifier;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub logs: LogStore,
    pub notifier: Arc<dyn RefreshNotifier>,
}

impl AppState {
    pub fn new(pool: SqlitePool, logs: LogStore, notifier: Arc<dyn RefreshNotifier>) -> Self {
        Self {
            pool,
            logs,
            notifier,
        }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Stage endpoints
        .route(
            "/stages",
            get(stage::list_stages)
                .post(stage::save_stages)
                .delete(stage::delete_all_stages),
        )
        .route("/stages/{id}", delete(stage::delete_stage))
        .route("/stage/{key}", get(stage::get_stage))
        .route("/stage/{key}/logs", get(stage::stage_logs))
        .route("/pipeline/{pipeline_file}", delete(stage::delete_pipeline))
        // Status endpoints
        .route("/stage/status", patch(status::update_stage_status))
        .route("/stage/status/reset", patch(status::reset_step_statuses))
        .route("/step/status", patch(status::update_step_status))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
