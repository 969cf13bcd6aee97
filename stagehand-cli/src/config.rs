//! Configuration module
//!
//! Resolves where the status API listens.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stagehand_client::StatusClient;

/// Directory under `$HOME` the runner links its socket into
const HOME_DIR: &str = ".stagehand";

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Unix socket of the status API
    pub socket: PathBuf,
}

impl Config {
    /// Use `socket` if given, otherwise `~/.stagehand/backend.sock`
    pub fn resolve(socket: Option<PathBuf>) -> Result<Self> {
        let socket = match socket {
            Some(socket) => socket,
            None => {
                let home = std::env::var("HOME").context("HOME is not set, pass --socket")?;
                default_socket(Path::new(&home))
            }
        };
        Ok(Self { socket })
    }

    pub fn client(&self) -> Result<StatusClient> {
        StatusClient::unix(&self.socket)
            .with_context(|| format!("Failed to create client for {:?}", self.socket))
    }
}

fn default_socket(home: &Path) -> PathBuf {
    home.join(HOME_DIR).join("backend.sock")
}
