//! Podman engine
//!
//! Runs every step as a podman container:
//! - one network per run so services resolve by step name
//! - one workspace volume per run when the source is cloned, otherwise the
//!   host directory is mounted
//! - step containers carry the step labels so the UI can find them
//! - everything created for the run is removed in `destroy`

use std::process::Stdio;

use async_trait::async_trait;
use stagehand_manifest::PullPolicy;
use stagehand_manifest::compiler::WORKSPACE;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{Engine, EngineError};
use crate::plan::{Plan, PlannedStep};
use crate::sink::StepWriter;

/// Seconds podman waits before killing a stopped container
const STOP_TIMEOUT_SECS: u32 = 10;

pub struct PodmanEngine {
    cli: String,
    run_id: String,
    /// Containers created so far, removed on destroy
    containers: Mutex<Vec<String>>,
    /// Workspace volume, created in setup when some step needs it
    volume: Mutex<Option<String>>,
}

impl PodmanEngine {
    pub fn new(cli: impl Into<String>) -> Self {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            cli: cli.into(),
            run_id: run_id[..12].to_string(),
            containers: Mutex::new(Vec::new()),
            volume: Mutex::new(None),
        }
    }

    fn network(&self) -> String {
        format!("stagehand-{}", self.run_id)
    }

    fn volume_name(&self) -> String {
        format!("stagehand-{}-src", self.run_id)
    }

    fn container_name(&self, step: &PlannedStep) -> String {
        format!("stagehand-{}-{}", self.run_id, step.labels.step_number())
    }

    /// Arguments of the `podman run` invocation for a step
    fn run_args(&self, step: &PlannedStep, container: &str, volume: Option<&str>) -> Vec<String> {
        let spec = &step.spec;
        let mut args = vec!["run".to_string()];

        if spec.detach {
            args.push("-d".to_string());
        }

        args.extend(["--name".to_string(), container.to_string()]);
        args.extend(["--network".to_string(), self.network()]);
        args.extend(["--network-alias".to_string(), spec.name.clone()]);
        args.extend(["--pull".to_string(), pull_flag(spec.pull).to_string()]);

        for (key, value) in spec.labels.iter().chain(step.labels.to_map().iter()) {
            args.extend(["--label".to_string(), format!("{}={}", key, value)]);
        }

        for (key, value) in &spec.environment {
            args.extend(["-e".to_string(), format!("{}={}", key, value)]);
        }

        match (&spec.mount, volume) {
            (Some(dir), _) => {
                args.extend(["-v".to_string(), format!("{}:{}", dir.display(), WORKSPACE)]);
            }
            (None, Some(volume)) => {
                args.extend(["-v".to_string(), format!("{}:{}", volume, WORKSPACE)]);
            }
            (None, None) => {}
        }

        args.extend(["-w".to_string(), spec.working_dir.clone()]);

        if spec.privileged {
            args.push("--privileged".to_string());
        }

        if !spec.entrypoint.is_empty() {
            // podman takes a JSON array for multi-word entrypoints
            let entrypoint = serde_json::to_string(&spec.entrypoint)
                .unwrap_or_else(|_| spec.entrypoint.join(" "));
            args.extend(["--entrypoint".to_string(), entrypoint]);
        }

        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        args
    }

    /// Run a podman command to completion and return its stdout
    async fn podman(&self, args: &[&str]) -> Result<String, EngineError> {
        let output = Command::new(&self.cli)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !stderr.is_empty() {
            debug!("{} {} stderr: {}", self.cli, args.join(" "), stderr);
        }

        if !output.status.success() {
            return Err(EngineError::Command {
                command: format!("{} {}", self.cli, args.join(" ")),
                message: format!(
                    "exit_code={}, stderr='{}'",
                    output.status.code().unwrap_or(-1),
                    stderr
                ),
            });
        }

        Ok(stdout)
    }

    async fn stop(&self, container: &str) {
        let timeout = STOP_TIMEOUT_SECS.to_string();
        match self.podman(&["stop", "-t", &timeout, container]).await {
            Ok(_) => info!("Stopped container {}", container),
            Err(e) => warn!("Failed to stop container {}: {}", container, e),
        }
    }
}

#[async_trait]
impl Engine for PodmanEngine {
    async fn setup(&self, plan: &Plan) -> Result<(), EngineError> {
        let version = self.podman(&["--version"]).await?;
        info!("Podman is available: {}", version);

        let network = self.network();
        self.podman(&["network", "create", &network]).await?;
        debug!("Created network {}", network);

        if plan.runnable().any(|s| s.spec.mount.is_none()) {
            let volume = self.volume_name();
            self.podman(&["volume", "create", &volume]).await?;
            debug!("Created workspace volume {}", volume);
            *self.volume.lock().await = Some(volume);
        }

        Ok(())
    }

    async fn run_step(
        &self,
        step: &PlannedStep,
        output: StepWriter,
        cancel: CancellationToken,
    ) -> Result<i32, EngineError> {
        let container = self.container_name(step);
        let volume = self.volume.lock().await.clone();
        let args = self.run_args(step, &container, volume.as_deref());

        self.containers.lock().await.push(container.clone());
        info!("Starting step {} in container {}", step.name(), container);

        if step.spec.detach {
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let id = self.podman(&refs).await?;
            debug!("Detached container {} started with ID: {}", container, id);
            return Ok(0);
        }

        let mut child = Command::new(&self.cli)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, output.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, output.clone())));
        }

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                warn!("Cancelling step {}", step.name());
                self.stop(&container).await;
                child.wait().await?
            }
        };

        for pump in pumps {
            if let Err(e) = pump.await {
                warn!("Output reader of {} failed: {}", step.name(), e);
            }
        }

        let code = status.code().unwrap_or(-1);
        debug!("Container {} exited with {}", container, code);
        Ok(code)
    }

    async fn destroy(&self) -> Result<(), EngineError> {
        let containers = std::mem::take(&mut *self.containers.lock().await);
        info!("Cleaning up {} container(s)", containers.len());

        for container in &containers {
            match self.podman(&["rm", "-f", container]).await {
                Ok(_) => debug!("Container {} removed", container),
                Err(e) => warn!("Failed to remove container {}: {}", container, e),
            }
        }

        if let Some(volume) = self.volume.lock().await.take() {
            if let Err(e) = self.podman(&["volume", "rm", "-f", &volume]).await {
                warn!("Failed to remove volume {}: {}", volume, e);
            }
        }

        self.podman(&["network", "rm", "-f", &self.network()]).await?;
        Ok(())
    }
}

/// Copy lines from a container stream into the step's log. File writes run
/// on the blocking pool so a slow disk does not stall the runtime.
async fn pump(stream: impl AsyncRead + Unpin, output: StepWriter) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let mut writer = output.clone();
                let written = tokio::task::spawn_blocking(move || {
                    std::io::Write::write_all(&mut writer, line.as_bytes())
                })
                .await
                .map_err(std::io::Error::other)
                .and_then(|r| r);
                if let Err(e) = written {
                    warn!("Dropping output of {}: {}", output.step(), e);
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                warn!("Reading output of {} failed: {}", output.step(), e);
                return;
            }
        }
    }
}

fn pull_flag(pull: PullPolicy) -> &'static str {
    match pull {
        PullPolicy::Always => "always",
        PullPolicy::Never => "never",
        PullPolicy::Default | PullPolicy::IfNotExists => "missing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanRequest;
    use stagehand_manifest::Compiler;

    const SOURCE: &str = r#"
kind: pipeline
name: default
services:
  - name: db
    image: postgres
steps:
  - name: build
    image: rust
    privileged: true
    pull: always
    commands: [cargo build]
"#;

    fn plan(mount: Option<&str>) -> Plan {
        Plan::build(PlanRequest {
            source: SOURCE.to_string(),
            pipeline_file: "/src/.drone.yml".to_string(),
            compiler: Compiler {
                mount: mount.map(Into::into),
                ..Compiler::default()
            },
            ..PlanRequest::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_pump_writes_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let sink = crate::sink::LogSink::open(dir.path(), "p").unwrap();

        pump(&b"compiling\r\nfinished\n"[..], sink.writer("build")).await;
        sink.close().unwrap();

        let text = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["step"], "build");
        assert_eq!(lines[0]["line"], "compiling");
        assert_eq!(lines[1]["line"], "finished");
    }

    #[tokio::test]
    async fn test_pump_stops_after_sink_closes() {
        let dir = tempfile::tempdir().unwrap();
        let sink = crate::sink::LogSink::open(dir.path(), "p").unwrap();
        sink.close().unwrap();

        pump(&b"lost\n"[..], sink.writer("build")).await;
        assert_eq!(std::fs::read_to_string(sink.path()).unwrap(), "");
    }

    fn pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_step_run_args() {
        let engine = PodmanEngine::new("podman");
        let plan = plan(Some("/home/me/project"));
        let build = plan.steps.iter().find(|s| s.name() == "build").unwrap();
        let args = engine.run_args(build, "c1", None);

        assert_eq!(args[0], "run");
        assert!(!args.contains(&"-d".to_string()));
        assert!(pair(&args, "--name", "c1"));
        assert!(pair(&args, "--pull", "always"));
        assert!(pair(&args, "--label", "io.stagehand.step.name=build"));
        assert!(pair(&args, "--label", "io.stagehand.step.number=1"));
        assert!(pair(&args, "--label", "io.stagehand.pipeline.service=false"));
        assert!(pair(&args, "-e", "DRONE_STEP_NAME=build"));
        assert!(pair(&args, "-v", "/home/me/project:/drone/src"));
        assert!(pair(&args, "--entrypoint", r#"["/bin/sh","-c"]"#));
        assert!(args.contains(&"--privileged".to_string()));

        let image = args.iter().position(|a| a == "rust").unwrap();
        assert!(args[image + 1].starts_with("set -e\n"));
    }

    #[test]
    fn test_service_runs_detached_on_volume() {
        let engine = PodmanEngine::new("podman");
        let plan = plan(None);
        let db = plan.steps.iter().find(|s| s.name() == "db").unwrap();
        let args = engine.run_args(db, "c0", Some("vol"));

        assert_eq!(&args[..2], &["run".to_string(), "-d".to_string()]);
        assert!(pair(&args, "--network-alias", "db"));
        assert!(pair(&args, "--label", "io.stagehand.pipeline.service=true"));
        assert!(pair(&args, "-v", "vol:/drone/src"));
        assert_eq!(args.last().map(String::as_str), Some("postgres"));
    }

    #[test]
    fn test_names_are_scoped_to_run() {
        let a = PodmanEngine::new("podman");
        let b = PodmanEngine::new("podman");
        assert_ne!(a.network(), b.network());
        assert!(a.volume_name().ends_with("-src"));
    }
}
