//! Plan executor
//!
//! Dispatches the runnable steps of a plan to an [`Engine`]. Without any
//! `depends_on` the steps run one after the other; otherwise each step waits
//! for its dependencies. A semaphore bounds how many run at once.

use std::collections::HashSet;
use std::sync::Arc;

use stagehand_manifest::ErrPolicy;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::Engine;
use crate::error::{ReportError, RunError};
use crate::plan::{Plan, PlannedStep};
use crate::reporter::Reporter;
use crate::sink::LogSink;
use crate::state::{ExecStatus, SharedState, State};

pub struct Execer {
    engine: Arc<dyn Engine>,
    reporter: Arc<dyn Reporter>,
    sink: LogSink,
    procs: usize,
}

impl Execer {
    pub fn new(
        engine: Arc<dyn Engine>,
        reporter: Arc<dyn Reporter>,
        sink: LogSink,
        procs: usize,
    ) -> Self {
        Self {
            engine,
            reporter,
            sink,
            procs: procs.max(1),
        }
    }

    /// Execute the plan, mutating `state` as it goes.
    ///
    /// Cancelling `cancel` stops dispatch, stops running steps and ends the
    /// stage as killed. A reporter failure aborts the run.
    pub async fn exec(
        &self,
        plan: &Plan,
        state: &Arc<SharedState>,
        cancel: &CancellationToken,
    ) -> Result<(), RunError> {
        let snapshot = state
            .update(|s| {
                s.stage.status = ExecStatus::Running;
                s.stage.started = Some(chrono::Utc::now());
            })
            .await;
        self.reporter.report_stage(&snapshot).await?;

        info!("Running stage {}", plan.stage_name);

        if let Err(e) = self.engine.setup(plan).await {
            error!("Engine setup failed: {}", e);
            self.teardown().await;
            let snapshot = state.update(|s| finish(s, ExecStatus::Error)).await;
            self.reporter.report_stage(&snapshot).await?;
            return Err(e.into());
        }

        let result = self.run_steps(plan, state, cancel).await;
        self.teardown().await;

        let snapshot = state
            .update(|s| {
                for step in s.stage.steps.iter_mut() {
                    if !step.status.is_done() {
                        step.status = ExecStatus::Skipped;
                    }
                }
                let status = stage_status(s, cancel.is_cancelled());
                finish(s, status);
            })
            .await;

        result?;

        info!("Stage {} finished: {}", plan.stage_name, snapshot.stage.status);
        self.reporter.report_stage(&snapshot).await?;
        Ok(())
    }

    async fn run_steps(
        &self,
        plan: &Plan,
        state: &Arc<SharedState>,
        cancel: &CancellationToken,
    ) -> Result<(), ReportError> {
        let steps: Vec<Arc<PlannedStep>> = plan.runnable().cloned().map(Arc::new).collect();
        let deps = dependencies(&steps);
        let semaphore = Arc::new(Semaphore::new(self.procs));
        let step_cancel = cancel.child_token();

        let mut pending: Vec<usize> = (0..steps.len()).collect();
        let mut finished: HashSet<String> = HashSet::new();
        let mut running = JoinSet::new();
        let mut halted = false;
        let mut cancel_seen = false;
        let mut first_error: Option<ReportError> = None;

        loop {
            if !halted && !cancel.is_cancelled() {
                let (ready, rest): (Vec<usize>, Vec<usize>) = pending
                    .into_iter()
                    .partition(|&i| deps[i].iter().all(|d| finished.contains(d)));
                pending = rest;

                for i in ready {
                    debug!("Dispatching step {}", steps[i].name());
                    let task = StepTask {
                        engine: self.engine.clone(),
                        reporter: self.reporter.clone(),
                        sink: self.sink.clone(),
                        state: state.clone(),
                        step: steps[i].clone(),
                        semaphore: semaphore.clone(),
                        cancel: step_cancel.clone(),
                    };
                    // The inner task turns a panic into a JoinError tied to `i`
                    running.spawn(async move { (i, tokio::spawn(task.run()).await) });
                }
            }

            if running.is_empty() {
                if !pending.is_empty() && !halted && !cancel.is_cancelled() {
                    warn!("{} step(s) have unmet dependencies", pending.len());
                }
                break;
            }

            tokio::select! {
                joined = running.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok((i, Ok(Ok(status)))) => {
                            let step = &steps[i];
                            finished.insert(step.name().to_string());
                            let ignore = step.spec.err_policy == ErrPolicy::Ignore;
                            if status.is_failed() && !ignore {
                                info!("Step {} ended with {}, not starting further steps", step.name(), status);
                                halted = true;
                            }
                        }
                        Ok((i, Ok(Err(e)))) => {
                            error!("Reporting step {} failed: {}", steps[i].name(), e);
                            first_error.get_or_insert(e);
                            halted = true;
                            step_cancel.cancel();
                        }
                        Ok((i, Err(e))) => {
                            let name = steps[i].name();
                            error!("Step {} task failed: {}", name, e);
                            finished.insert(name.to_string());
                            halted = true;
                            let snapshot = state
                                .update(|s| {
                                    if let Some(step) = s.step_mut(name) {
                                        step.status = ExecStatus::Error;
                                    }
                                })
                                .await;
                            if let Err(e) = self.reporter.report_step(&snapshot, name).await {
                                error!("Reporting step {} failed: {}", name, e);
                                first_error.get_or_insert(e);
                                step_cancel.cancel();
                            }
                        }
                        Err(e) => {
                            error!("Step task failed: {}", e);
                            halted = true;
                        }
                    }
                }
                _ = cancel.cancelled(), if !cancel_seen => {
                    warn!("Run cancelled, stopping running steps");
                    cancel_seen = true;
                    halted = true;
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn teardown(&self) {
        if let Err(e) = self.engine.destroy().await {
            warn!("Engine teardown failed: {}", e);
        }
    }
}

/// One step running on its own task
struct StepTask {
    engine: Arc<dyn Engine>,
    reporter: Arc<dyn Reporter>,
    sink: LogSink,
    state: Arc<SharedState>,
    step: Arc<PlannedStep>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl StepTask {
    async fn run(self) -> Result<ExecStatus, ReportError> {
        let name = self.step.name().to_string();

        let _permit = tokio::select! {
            permit = self.semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return Ok(ExecStatus::Skipped),
            },
            _ = self.cancel.cancelled() => return Ok(ExecStatus::Skipped),
        };

        let snapshot = self
            .state
            .update(|s| {
                if let Some(step) = s.step_mut(&name) {
                    step.status = ExecStatus::Running;
                }
            })
            .await;
        self.reporter.report_step(&snapshot, &name).await?;

        let mut writer = self.sink.writer(name.clone());
        let result = self
            .engine
            .run_step(&self.step, writer.clone(), self.cancel.clone())
            .await;

        let (status, exit_code) = match result {
            Ok(0) => (ExecStatus::Success, Some(0)),
            Ok(code) if self.cancel.is_cancelled() => (ExecStatus::Killed, Some(code)),
            Ok(code) => (ExecStatus::Failure, Some(code)),
            Err(e) => {
                error!("Step {} could not run: {}", name, e);
                if let Err(io) =
                    std::io::Write::write_all(&mut writer, format!("error: {}\n", e).as_bytes())
                {
                    warn!("Writing error of step {} to the log failed: {}", name, io);
                }
                if self.cancel.is_cancelled() {
                    (ExecStatus::Killed, None)
                } else {
                    (ExecStatus::Error, None)
                }
            }
        };

        debug!("Step {} -> {} (exit code {:?})", name, status, exit_code);

        let snapshot = self
            .state
            .update(|s| {
                if let Some(step) = s.step_mut(&name) {
                    step.status = status;
                    step.exit_code = exit_code;
                }
            })
            .await;
        self.reporter.report_step(&snapshot, &name).await?;

        Ok(status)
    }
}

/// Names each step waits for. Without any declared dependency every step
/// waits for the one before it.
fn dependencies(steps: &[Arc<PlannedStep>]) -> Vec<Vec<String>> {
    let declared = steps.iter().any(|s| !s.spec.depends_on.is_empty());

    if !declared {
        return steps
            .iter()
            .enumerate()
            .map(|(i, _)| match i {
                0 => Vec::new(),
                _ => vec![steps[i - 1].name().to_string()],
            })
            .collect();
    }

    let runnable: HashSet<&str> = steps.iter().map(|s| s.name()).collect();
    steps
        .iter()
        .map(|s| {
            s.spec
                .depends_on
                .iter()
                .filter(|d| runnable.contains(d.as_str()))
                .cloned()
                .collect()
        })
        .collect()
}

fn stage_status(state: &State, cancelled: bool) -> ExecStatus {
    if cancelled {
        return ExecStatus::Killed;
    }

    let counted = || state.stage.steps.iter().filter(|s| !s.err_ignore);

    if counted().any(|s| s.status == ExecStatus::Error) {
        ExecStatus::Error
    } else if counted().any(|s| s.status.is_failed()) {
        ExecStatus::Failure
    } else {
        ExecStatus::Success
    }
}

fn finish(state: &mut State, status: ExecStatus) {
    state.stage.status = status;
    state.stage.finished = Some(chrono::Utc::now());
}
