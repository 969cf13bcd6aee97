//! Stagehand Backend
//!
//! Status store for stages and steps, served as an HTTP API over a Unix
//! domain socket. The runner reports transitions here; UI clients read them.

pub mod api;
pub mod config;
pub mod db;
pub mod logs;
pub mod notify;
pub mod repository;
pub mod service;

use std::future::Future;

use tokio::net::UnixListener;

pub use api::{AppState, create_router};

/// Serve the API on an already bound listener until `shutdown` resolves
pub async fn serve(
    listener: UnixListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
