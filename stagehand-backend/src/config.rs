//! Backend configuration
//!
//! Command line flags with environment fallbacks.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "stagehand-backend")]
#[command(about = "Stagehand status store, served over a Unix socket", long_about = None)]
pub struct ServerConfig {
    /// Unix domain socket to listen on
    #[arg(
        long,
        env = "STAGEHAND_SOCKET",
        default_value = "/run/guest/volumes-service.sock"
    )]
    pub socket: PathBuf,

    /// SQLite database file
    #[arg(long = "db-path", env = "STAGEHAND_DB_FILE", default_value = "/data/db")]
    pub db_path: PathBuf,

    /// Directory the runner writes pipeline logs into
    #[arg(long = "logs-dir", env = "STAGEHAND_LOGS_PATH", default_value = "/data/logs")]
    pub logs_dir: PathBuf,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub level: String,

    /// Container CLI used to signal the UI
    #[arg(long = "container-cli", env = "STAGEHAND_CONTAINER_CLI", default_value = "podman")]
    pub container_cli: String,

    /// Image of the throw-away UI refresh container
    #[arg(long = "refresh-image", env = "STAGEHAND_REFRESH_IMAGE", default_value = "docker.io/library/alpine:latest")]
    pub refresh_image: String,

    /// Disable UI refresh signals
    #[arg(long = "no-refresh")]
    pub no_refresh: bool,
}

impl ServerConfig {
    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.socket.as_os_str().is_empty() {
            anyhow::bail!("socket path cannot be empty");
        }

        if self.db_path.as_os_str().is_empty() {
            anyhow::bail!("db path cannot be empty");
        }

        if self.logs_dir.as_os_str().is_empty() {
            anyhow::bail!("logs dir cannot be empty");
        }

        if self.container_cli.trim().is_empty() && !self.no_refresh {
            anyhow::bail!("container cli cannot be empty unless refresh is disabled");
        }

        if !matches!(
            self.level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            anyhow::bail!("unknown log level: {}", self.level);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["stagehand-backend"]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/data/db"));
        assert_eq!(config.logs_dir, PathBuf::from("/data/logs"));
        assert_eq!(config.container_cli, "podman");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::try_parse_from([
            "stagehand-backend",
            "--socket",
            "/tmp/s.sock",
            "--level",
            "debug",
        ])
        .unwrap();
        assert!(config.validate().is_ok());

        config.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.level = "info".to_string();
        config.container_cli = String::new();
        assert!(config.validate().is_err());

        config.no_refresh = true;
        assert!(config.validate().is_ok());
    }
}
