//! Stage command handlers
//!
//! Handles listing, inspecting, resetting and deleting stages.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use colored::*;
use stagehand_client::StatusClient;
use stagehand_core::domain::stage::Stage;
use stagehand_core::dto::status::{ResetRequest, StatusUpdate};

use super::colored_status;

/// Stage subcommands
#[derive(Subcommand)]
pub enum StageCommands {
    /// List all stages
    List {
        /// Only stages of this pipeline file
        #[arg(short, long)]
        pipeline_file: Option<String>,
    },
    /// Get stage details, by ID or pipeline file
    Get {
        /// Stage ID, or a pipeline file to show all of its stages
        key: String,
    },
    /// Set the status of a stage or one of its steps
    SetStatus {
        #[arg(short, long)]
        pipeline_file: String,

        #[arg(short, long)]
        stage: String,

        /// Update this step instead of the stage
        #[arg(long)]
        step: Option<String>,

        /// none, running, success, error, failure or killed
        status: String,
    },
    /// Put every step of a stage back to `none`
    Reset {
        #[arg(short, long)]
        pipeline_file: String,

        #[arg(short, long)]
        stage: String,
    },
    /// Delete a stage
    Delete {
        /// Stage ID
        id: i64,
    },
    /// Delete every stage and all logs
    DeleteAll {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
}

pub async fn handle_stage_command(command: StageCommands, client: &StatusClient) -> Result<()> {
    match command {
        StageCommands::List { pipeline_file } => list_stages(client, pipeline_file).await,
        StageCommands::Get { key } => get_stage(client, &key).await,
        StageCommands::SetStatus {
            pipeline_file,
            stage,
            step,
            status,
        } => set_status(client, pipeline_file, stage, step, &status).await,
        StageCommands::Reset {
            pipeline_file,
            stage,
        } => {
            client
                .reset_step_statuses(&ResetRequest {
                    pipeline_file,
                    stage_name: stage.clone(),
                })
                .await?;
            println!("{}", format!("✓ Steps of {} reset", stage).green().bold());
            Ok(())
        }
        StageCommands::Delete { id } => {
            client
                .delete_stage(id)
                .await
                .with_context(|| format!("Failed to delete stage {}", id))?;
            println!("{}", format!("✓ Stage {} deleted", id).green().bold());
            Ok(())
        }
        StageCommands::DeleteAll { yes } => {
            if !yes {
                bail!("refusing to delete every stage without --yes");
            }
            client.delete_all_stages().await?;
            println!("{}", "✓ All stages deleted".green().bold());
            Ok(())
        }
    }
}

async fn list_stages(client: &StatusClient, pipeline_file: Option<String>) -> Result<()> {
    let stages = match pipeline_file {
        Some(pf) => client.list_stages_for(&pf).await?,
        None => client.list_stages().await?,
    };

    if stages.is_empty() {
        println!("{}", "No stages found.".yellow());
    } else {
        println!("{}", format!("Found {} stage(s):", stages.len()).bold());
        println!();
        for stage in &stages {
            print_stage_summary(stage);
        }
    }

    Ok(())
}

async fn get_stage(client: &StatusClient, key: &str) -> Result<()> {
    match key.parse::<i64>() {
        Ok(id) => print_stage_details(&client.get_stage(id).await?),
        Err(_) => {
            let stages = client.stages_by_pipeline_file(key).await?;
            if stages.is_empty() {
                println!("{}", format!("No stages recorded for {}.", key).yellow());
            }
            for stage in &stages {
                print_stage_details(stage);
                println!();
            }
        }
    }
    Ok(())
}

async fn set_status(
    client: &StatusClient,
    pipeline_file: String,
    stage: String,
    step: Option<String>,
    status: &str,
) -> Result<()> {
    match step {
        Some(step) => {
            let update = StatusUpdate::step(&pipeline_file, &stage, &step, status);
            client.update_step_status(&update).await?;
            println!("{}", format!("✓ {}/{} -> {}", stage, step, update.status).green());
        }
        None => {
            let update = StatusUpdate::stage(&pipeline_file, &stage, status);
            client.update_stage_status(&update).await?;
            println!("{}", format!("✓ {} -> {}", stage, update.status).green());
        }
    }
    Ok(())
}

/// Print a stage summary
pub(crate) fn print_stage_summary(stage: &Stage) {
    println!(
        "  {} {} [{}]",
        "▸".cyan(),
        stage.name.bold(),
        colored_status(stage.status)
    );
    println!("    ID:       {}", stage.id.to_string().dimmed());
    println!("    Pipeline: {}", stage.pipeline_file.dimmed());
    println!("    Steps:    {}", stage.steps.len().to_string().dimmed());
    println!(
        "    Updated:  {}",
        stage
            .updated_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

/// Print detailed stage information
fn print_stage_details(stage: &Stage) {
    println!("{}", "Stage Details:".bold());
    println!("  ID:       {}", stage.id.to_string().cyan());
    println!("  Name:     {}", stage.name.bold());
    println!("  Status:   {}", colored_status(stage.status));
    println!("  Pipeline: {}", stage.pipeline_file);
    if !stage.pipeline_path.is_empty() {
        println!("  Path:     {}", stage.pipeline_path);
    }
    println!(
        "  Updated:  {}",
        stage.updated_at.format("%Y-%m-%d %H:%M:%S")
    );

    if stage.steps.is_empty() {
        return;
    }

    println!("\n{}", "Steps:".bold());
    println!("{}", "─".repeat(60).dimmed());
    for step in &stage.steps {
        let ignore = if step.err_ignore { " (failure ignored)" } else { "" };
        println!(
            "  {:>3}. {:<24} {:<8} {}{}",
            step.number,
            step.name,
            colored_status(step.status),
            step.image.dimmed(),
            ignore.dimmed()
        );
    }
    println!("{}", "─".repeat(60).dimmed());
}
