//! Run supervisor
//!
//! Owns one run end to end: cancellation (deadline and Ctrl-C), the log sink,
//! the status reporter, stage registration, execution and the diagnostic dump
//! written when a run aborts.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use stagehand_core::pipeline_id;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::{Engine, Execer};
use crate::error::{ReportError, RunError, TransportError};
use crate::plan::Plan;
use crate::reporter::{ReporterConfig, StatusReporter};
use crate::sink::LogSink;
use crate::state::{ExecStatus, SharedState, State};

/// How a finished run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Failure => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub socket_path: PathBuf,
    pub logs_dir: PathBuf,
    pub timeout: Duration,
    pub procs: usize,
    /// Cancel the run on Ctrl-C
    pub handle_interrupt: bool,
}

pub struct Supervisor {
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, plan: Plan, engine: Arc<dyn Engine>) -> Result<Outcome, RunError> {
        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();
        self.watch_deadline(&cancel);
        if self.config.handle_interrupt {
            watch_interrupt(&cancel);
        }

        let state = Arc::new(SharedState::new(plan.state.clone()));

        let sink = match LogSink::open(&self.config.logs_dir, &plan.pipeline_file) {
            Ok(sink) => sink,
            Err(e) => {
                let err = RunError::Transport(TransportError::Sink(e));
                self.dump(&plan.pipeline_file, &err, &plan.state);
                return Err(err);
            }
        };

        let reporter = match StatusReporter::new(ReporterConfig {
            socket_path: self.config.socket_path.clone(),
            pipeline_file: plan.pipeline_file.clone(),
        }) {
            Ok(reporter) => reporter,
            Err(e) => {
                let err = RunError::Report(e);
                self.dump(&plan.pipeline_file, &err, &plan.state);
                close(&sink);
                return Err(err);
            }
        };

        if let Err(e) = reporter.register(&plan.save_stage()).await {
            let err = match e {
                ReportError::Client(c) => RunError::Transport(TransportError::Client(c)),
                other => RunError::Report(other),
            };
            self.dump(&plan.pipeline_file, &err, &plan.state);
            close(&sink);
            return Err(err);
        }

        let execer = Execer::new(engine, Arc::new(reporter), sink.clone(), self.config.procs);
        let result = execer.exec(&plan, &state, &cancel).await;
        close(&sink);

        let snapshot = state.snapshot().await;
        if let Err(e) = result {
            error!("Run of stage {} aborted: {}", plan.stage_name, e);
            self.dump(&plan.pipeline_file, &e, &snapshot);
            return Err(e);
        }

        Ok(classify(&snapshot))
    }

    fn watch_deadline(&self, cancel: &CancellationToken) {
        let cancel = cancel.clone();
        let timeout = self.config.timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    warn!("Run exceeded its timeout of {:?}, cancelling", timeout);
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        });
    }

    /// Best-effort diagnostic snapshot, falling back to stdout
    fn dump(&self, pipeline_file: &str, err: &RunError, state: &State) {
        let body = serde_json::json!({
            "error": err.to_string(),
            "state": state,
        });
        let text = match serde_json::to_string_pretty(&body) {
            Ok(text) => text,
            Err(e) => {
                error!("Unable to serialize diagnostics: {}", e);
                return;
            }
        };

        let path = pipeline_id::error_file(&self.config.logs_dir, pipeline_file);
        match std::fs::File::create(&path).and_then(|mut f| writeln!(f, "{}", text)) {
            Ok(()) => info!("Diagnostics written to {:?}", path),
            Err(e) => {
                error!("Error opening file {:?}: {}, using stdout", path, e);
                println!("{}", text);
            }
        }
    }
}

fn watch_interrupt(cancel: &CancellationToken) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    warn!("Received interrupt, terminating run");
                    cancel.cancel();
                }
            }
            _ = cancel.cancelled() => {}
        }
    });
}

fn close(sink: &LogSink) {
    if let Err(e) = sink.close() {
        warn!("Closing log sink {:?} failed: {}", sink.path(), e);
    }
}

fn classify(state: &State) -> Outcome {
    match state.stage.status {
        ExecStatus::Error | ExecStatus::Failure | ExecStatus::Killed => Outcome::Failure,
        _ => Outcome::Success,
    }
}
