//! Runner configuration
//!
//! Command line flags of `stagehand-exec` and the resolved configuration
//! derived from them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use stagehand_manifest::Compiler;

use crate::plan::PlanRequest;
use crate::supervisor::SupervisorConfig;

/// Directory under `$HOME` holding the socket link and the logs
const HOME_DIR: &str = ".stagehand";

#[derive(Debug, Clone, Parser)]
#[command(name = "stagehand-exec")]
#[command(about = "Run a pipeline stage in containers and report its progress", long_about = None)]
pub struct ExecArgs {
    /// Pipeline file
    #[arg(default_value = ".drone.yml")]
    pub source: PathBuf,

    /// Name of the stage (pipeline) to run
    #[arg(long)]
    pub pipeline: Option<String>,

    /// Names of steps to include
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Names of steps to exclude
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Name of the step to resume at
    #[arg(long = "resume-at")]
    pub resume_at: Option<String>,

    /// Run timeout in minutes
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Maximum number of steps running at once
    #[arg(long, default_value_t = 2)]
    pub procs: usize,

    /// Clone the repository instead of mounting the working directory
    #[arg(long)]
    pub clone: bool,

    /// Extra environment for every step, as KEY=VALUE
    #[arg(long = "env", short = 'e', value_parser = parse_env)]
    pub env: Vec<(String, String)>,

    /// Unix socket of the status API (default: ~/.stagehand/backend.sock)
    #[arg(long, env = "STAGEHAND_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Directory for pipeline logs (default: ~/.stagehand/logs)
    #[arg(long = "logs-dir", env = "STAGEHAND_LOGS_PATH")]
    pub logs_dir: Option<PathBuf>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub level: String,

    /// Container CLI used to run steps
    #[arg(long = "container-cli", env = "STAGEHAND_CONTAINER_CLI", default_value = "podman")]
    pub container_cli: String,
}

/// Resolved runner configuration
#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub source: PathBuf,
    /// Absolute path of the pipeline file; the pipeline's identity
    pub pipeline_file: String,
    /// Directory mounted as the workspace when not cloning
    pub workspace: PathBuf,
    pub stage: Option<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub resume_at: Option<String>,
    pub timeout: Duration,
    pub procs: usize,
    pub clone: bool,
    pub environ: BTreeMap<String, String>,
    pub socket_path: PathBuf,
    pub logs_dir: PathBuf,
    pub container_cli: String,
}

impl ExecConfig {
    /// Resolves paths against the working directory and `$HOME`
    pub fn from_args(args: ExecArgs) -> anyhow::Result<Self> {
        let workspace = std::env::current_dir()?;
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| workspace.clone());
        Ok(Self::resolve(args, &workspace, &home))
    }

    fn resolve(args: ExecArgs, workspace: &Path, home: &Path) -> Self {
        let stagehand_home = home.join(HOME_DIR);
        let pipeline_file = workspace.join(&args.source).to_string_lossy().to_string();

        Self {
            source: args.source,
            pipeline_file,
            workspace: workspace.to_path_buf(),
            stage: args.pipeline,
            include: args.include,
            exclude: args.exclude,
            resume_at: args.resume_at,
            timeout: Duration::from_secs(args.timeout.saturating_mul(60)),
            procs: args.procs,
            clone: args.clone,
            environ: args.env.into_iter().collect(),
            socket_path: args
                .socket
                .unwrap_or_else(|| stagehand_home.join("backend.sock")),
            logs_dir: args.logs_dir.unwrap_or_else(|| stagehand_home.join("logs")),
            container_cli: args.container_cli,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.source.as_os_str().is_empty() {
            anyhow::bail!("source cannot be empty");
        }

        if self.timeout.is_zero() {
            anyhow::bail!("timeout must be greater than 0");
        }

        if self.procs == 0 {
            anyhow::bail!("procs must be greater than 0");
        }

        if self.container_cli.trim().is_empty() {
            anyhow::bail!("container cli cannot be empty");
        }

        if self.environ.keys().any(|k| k.contains(char::is_whitespace)) {
            anyhow::bail!("environment variable names cannot contain whitespace");
        }

        Ok(())
    }

    /// Plan request for the given manifest source
    pub fn plan_request(&self, source: String) -> PlanRequest {
        let pipeline_path = Path::new(&self.pipeline_file)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        PlanRequest {
            source,
            stage: self.stage.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            resume_at: self.resume_at.clone(),
            pipeline_file: self.pipeline_file.clone(),
            pipeline_path,
            compiler: Compiler {
                mount: (!self.clone).then(|| self.workspace.clone()),
                environ: self.environ.clone(),
                labels: BTreeMap::new(),
                clone: self.clone,
            },
        }
    }

    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            socket_path: self.socket_path.clone(),
            logs_dir: self.logs_dir.clone(),
            timeout: self.timeout,
            procs: self.procs,
            handle_interrupt: true,
        }
    }
}

fn parse_env(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
