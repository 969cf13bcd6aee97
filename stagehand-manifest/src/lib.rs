//! Stagehand Manifest
//!
//! Pipeline manifest handling for Stagehand. It includes:
//! - Definition types for the Drone-style YAML manifest
//! - Multi-document parsing and stage lookup
//! - Linting of a single pipeline
//! - Compilation of a pipeline into an executable step list

pub mod compiler;
pub mod definition;
pub mod error;
pub mod lint;
pub mod parser;

pub use compiler::{Compiler, ErrPolicy, PullPolicy, Spec, StepSpec};
pub use definition::{Pipeline, StepDefinition};
pub use error::{CompileError, ManifestError};
pub use lint::lint;
pub use parser::{Manifest, parse};
