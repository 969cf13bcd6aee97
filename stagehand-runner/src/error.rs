//! Runner error types

use stagehand_client::ClientError;
use stagehand_manifest::{CompileError, ManifestError};
use thiserror::Error;

use crate::engine::EngineError;

/// Errors that end a run
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("stage '{stage}' not found in build file (available: {})", .available.join(", "))]
    StageNotFound {
        stage: String,
        available: Vec<String>,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("status report failed: {0}")]
    Report(#[from] ReportError),
}

/// Failures reaching the status store or the log sink
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("status store: {0}")]
    Client(#[from] ClientError),

    #[error("log sink: {0}")]
    Sink(#[from] std::io::Error),
}

/// Failures of the status reporter
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("step '{step}' is not part of stage '{stage}'")]
    UnknownStep { stage: String, step: String },

    #[error(transparent)]
    Client(#[from] ClientError),
}
