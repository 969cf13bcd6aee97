use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use stagehand_runner::config::{ExecArgs, ExecConfig};
use stagehand_runner::engine::PodmanEngine;
use stagehand_runner::{Plan, Supervisor};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ExecArgs::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("stagehand_runner={}", args.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ExecConfig::from_args(args)?;
    config.validate()?;

    info!(
        "Running {} (socket {:?}, logs {:?})",
        config.pipeline_file, config.socket_path, config.logs_dir
    );

    let source = tokio::fs::read_to_string(&config.source)
        .await
        .with_context(|| format!("Failed to read pipeline file {:?}", config.source))?;

    let plan = Plan::build(config.plan_request(source))?;

    tokio::fs::create_dir_all(&config.logs_dir)
        .await
        .with_context(|| format!("Failed to create logs directory {:?}", config.logs_dir))?;

    let engine = Arc::new(PodmanEngine::new(config.container_cli.clone()));
    let supervisor = Supervisor::new(config.supervisor());

    match supervisor.run(plan, engine).await {
        Ok(outcome) => {
            info!("Run finished: {:?}", outcome);
            std::process::exit(outcome.exit_code());
        }
        Err(e) => {
            error!("Run failed: {}", e);
            std::process::exit(1);
        }
    }
}
