//! Stagehand CLI
//!
//! Command-line interface for inspecting and cleaning up the status store.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Stagehand status store CLI", long_about = None)]
struct Cli {
    /// Unix socket of the status API (default: ~/.stagehand/backend.sock)
    #[arg(long, env = "STAGEHAND_SOCKET")]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.socket)?;

    handle_command(cli.command, &config).await
}
