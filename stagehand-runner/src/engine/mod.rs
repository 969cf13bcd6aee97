//! Execution engine
//!
//! [`Engine`] is the port to the container runtime; [`Execer`] drives a plan
//! through it and reports every transition.

mod execer;
mod podman;

pub use execer::Execer;
pub use podman::PodmanEngine;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::plan::{Plan, PlannedStep};
use crate::sink::StepWriter;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{command}` failed: {message}")]
    Command { command: String, message: String },
}

/// Container runtime used to execute steps
#[async_trait]
pub trait Engine: Send + Sync {
    /// Prepare shared resources for the run
    async fn setup(&self, plan: &Plan) -> Result<(), EngineError>;

    /// Run one step to completion and return its exit code. Output goes to
    /// `output`. When `cancel` fires the step must be stopped.
    /// Detached steps return once started.
    async fn run_step(
        &self,
        step: &PlannedStep,
        output: StepWriter,
        cancel: CancellationToken,
    ) -> Result<i32, EngineError>;

    /// Release everything created for the run
    async fn destroy(&self) -> Result<(), EngineError>;
}
