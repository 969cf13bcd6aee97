//! Live run state
//!
//! The execer mutates the state as steps progress and hands snapshots to the
//! reporter. It is also what the diagnostic dump contains.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

/// Status of a stage or step as seen by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failure,
    Error,
    Killed,
    Skipped,
}

impl ExecStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecStatus::Pending => "pending",
            ExecStatus::Running => "running",
            ExecStatus::Success => "success",
            ExecStatus::Failure => "failure",
            ExecStatus::Error => "error",
            ExecStatus::Killed => "killed",
            ExecStatus::Skipped => "skipped",
        }
    }

    /// Whether the stage or step has finished one way or another
    pub fn is_done(&self) -> bool {
        !matches!(self, ExecStatus::Pending | ExecStatus::Running)
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            ExecStatus::Failure | ExecStatus::Error | ExecStatus::Killed
        )
    }
}

impl std::fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct State {
    pub stage: StageState,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageState {
    pub name: String,
    pub status: ExecStatus,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    /// Steps that will run, in execution order
    pub steps: Vec<StepState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepState {
    pub name: String,
    /// 1-based position among the steps that run
    pub number: i64,
    pub status: ExecStatus,
    pub err_ignore: bool,
    pub exit_code: Option<i32>,
    pub detached: bool,
}

impl State {
    pub fn new(stage_name: impl Into<String>) -> Self {
        Self {
            stage: StageState {
                name: stage_name.into(),
                status: ExecStatus::Pending,
                started: None,
                finished: None,
                steps: Vec::new(),
            },
        }
    }

    /// Position and state of a step, looked up by name
    pub fn find_step(&self, name: &str) -> Option<(usize, &StepState)> {
        self.stage
            .steps
            .iter()
            .enumerate()
            .find(|(_, s)| s.name == name)
    }

    pub fn step_mut(&mut self, name: &str) -> Option<&mut StepState> {
        self.stage.steps.iter_mut().find(|s| s.name == name)
    }
}

/// State shared between the step tasks of one run
#[derive(Debug)]
pub struct SharedState {
    inner: Mutex<State>,
}

impl SharedState {
    pub fn new(state: State) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    /// Apply a change and return a snapshot of the result
    pub async fn update(&self, f: impl FnOnce(&mut State)) -> State {
        let mut state = self.inner.lock().await;
        f(&mut state);
        state.clone()
    }

    pub async fn snapshot(&self) -> State {
        self.inner.lock().await.clone()
    }
}
