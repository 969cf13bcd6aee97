//! UI Refresh Notification
//!
//! After each successful mutation the backend nudges the UI. The UI watches
//! container events, so the default notifier starts a throw-away container
//! carrying the refresh label. Notification is fire-and-forget: failures are
//! logged and never reach the caller.

use std::process::Stdio;

use stagehand_core::labels::LABEL_UI_REFRESH;
use tokio::process::Command;

pub trait RefreshNotifier: Send + Sync {
    /// Ask the UI to refresh. Must not block the caller.
    fn notify(&self);
}

/// Starts `<cli> run --rm --label io.stagehand.ui.refresh=true <image> true`
#[derive(Debug, Clone)]
pub struct ContainerRefreshNotifier {
    cli: String,
    image: String,
}

impl ContainerRefreshNotifier {
    pub const DEFAULT_IMAGE: &'static str = "docker.io/library/alpine:latest";

    pub fn new(cli: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            cli: cli.into(),
            image: image.into(),
        }
    }

    fn args(&self) -> Vec<String> {
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "--label".to_string(),
            format!("{}=true", LABEL_UI_REFRESH),
            self.image.clone(),
            "true".to_string(),
        ]
    }
}

impl RefreshNotifier for ContainerRefreshNotifier {
    fn notify(&self) {
        let cli = self.cli.clone();
        let args = self.args();

        tokio::spawn(async move {
            let result = Command::new(&cli)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output()
                .await;

            match result {
                Ok(output) if output.status.success() => {
                    tracing::debug!("UI refresh signal sent");
                }
                Ok(output) => {
                    tracing::warn!(
                        "UI refresh container exited with {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to start UI refresh container with {}: {}", cli, e);
                }
            }
        });
    }
}

/// Notifier that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl RefreshNotifier for NoopNotifier {
    fn notify(&self) {}
}
