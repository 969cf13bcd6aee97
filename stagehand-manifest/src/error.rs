//! Manifest error types

use thiserror::Error;

/// Errors raised while reading a manifest, before anything is compiled
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("manifest does not define any pipeline")]
    Empty,

    #[error("pipeline '{pipeline}' failed linting: {}", .problems.join("; "))]
    Lint {
        pipeline: String,
        problems: Vec<String>,
    },
}

/// Errors raised while compiling a pipeline into a step list
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("dependency cycle detected involving step '{0}'")]
    Cycle(String),
}
