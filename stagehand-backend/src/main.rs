use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use stagehand_backend::config::ServerConfig;
use stagehand_backend::logs::LogStore;
use stagehand_backend::notify::{ContainerRefreshNotifier, NoopNotifier, RefreshNotifier};
use stagehand_backend::{AppState, db};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("stagehand_backend={},tower_http=debug", config.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate()?;

    tracing::info!("Starting Stagehand backend...");

    if let Some(parent) = config.db_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating database directory {:?}", parent))?;
    }
    tokio::fs::create_dir_all(&config.logs_dir)
        .await
        .with_context(|| format!("creating logs directory {:?}", config.logs_dir))?;

    tracing::info!("Opening database {:?}", config.db_path);

    let pool = db::create_pool(&config.db_path)
        .await
        .context("Failed to create database pool")?;

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let notifier: Arc<dyn RefreshNotifier> = if config.no_refresh {
        Arc::new(NoopNotifier)
    } else {
        Arc::new(ContainerRefreshNotifier::new(
            config.container_cli.clone(),
            config.refresh_image.clone(),
        ))
    };

    let state = AppState::new(pool.clone(), LogStore::new(&config.logs_dir), notifier);

    // A previous run may have left its socket behind
    match tokio::fs::remove_file(&config.socket).await {
        Ok(()) => tracing::debug!("Removed stale socket {:?}", config.socket),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("removing {:?}", config.socket)),
    }

    let listener = tokio::net::UnixListener::bind(&config.socket)
        .with_context(|| format!("Failed to bind to {:?}", config.socket))?;

    tracing::info!("Listening on {:?}", config.socket);

    stagehand_backend::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down");
    })
    .await
    .context("Server error")?;

    pool.close().await;
    let _ = tokio::fs::remove_file(&config.socket).await;

    Ok(())
}
