//! Pipeline command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use stagehand_client::StatusClient;

use super::stage::print_stage_summary;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// List the stages recorded for a pipeline file
    Stages {
        /// Pipeline file path as recorded by the runner
        pipeline_file: String,
    },
    /// Delete every stage of a pipeline file and its logs
    Delete {
        /// Pipeline file path as recorded by the runner
        pipeline_file: String,
    },
}

pub async fn handle_pipeline_command(
    command: PipelineCommands,
    client: &StatusClient,
) -> Result<()> {
    match command {
        PipelineCommands::Stages { pipeline_file } => {
            let stages = client.stages_by_pipeline_file(&pipeline_file).await?;
            if stages.is_empty() {
                println!(
                    "{}",
                    format!("No stages recorded for {}.", pipeline_file).yellow()
                );
            }
            for stage in &stages {
                print_stage_summary(stage);
            }
            Ok(())
        }
        PipelineCommands::Delete { pipeline_file } => {
            client.delete_pipeline(&pipeline_file).await?;
            println!(
                "{}",
                format!("✓ Stages of {} deleted", pipeline_file).green().bold()
            );
            Ok(())
        }
    }
}
