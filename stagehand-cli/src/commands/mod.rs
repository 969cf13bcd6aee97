//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod logs;
mod pipeline;
mod stage;

pub use pipeline::PipelineCommands;
pub use stage::StageCommands;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use stagehand_core::domain::status::Status;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Stage management
    Stages {
        #[command(subcommand)]
        command: StageCommands,
    },
    /// Pipeline file management
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Show the log lines of a stage
    Logs {
        /// Stage ID
        id: i64,

        /// Only show lines of this step
        #[arg(long)]
        step: Option<String>,

        /// Print raw JSON records
        #[arg(long)]
        json: bool,
    },
    /// Check that the status API is reachable
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = config.client()?;

    match command {
        Commands::Stages { command } => stage::handle_stage_command(command, &client).await,
        Commands::Pipeline { command } => {
            pipeline::handle_pipeline_command(command, &client).await
        }
        Commands::Logs { id, step, json } => logs::show_logs(&client, id, step, json).await,
        Commands::Health => {
            client.health().await?;
            println!("{}", format!("✓ Status API at {:?} is up", config.socket).green());
            Ok(())
        }
    }
}

/// Render a status with its conventional color
pub(crate) fn colored_status(status: Status) -> ColoredString {
    match status {
        Status::Success => status.as_str().green(),
        Status::Running => status.as_str().cyan(),
        Status::Error => status.as_str().red(),
        Status::Killed => status.as_str().magenta(),
        Status::None => status.as_str().dimmed(),
    }
}
