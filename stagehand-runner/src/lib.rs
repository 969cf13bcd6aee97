//! Stagehand Runner
//!
//! Executes one stage of a pipeline manifest in containers.
//!
//! Architecture:
//! - Plan: parse, lint and compile the manifest, then filter steps
//! - Supervisor: cancellation, log sink, reporter and diagnostics for a run
//! - Engine: the container runtime port and the executor driving it
//! - Reporter: pushes every stage and step transition to the status store
//! - Sink: the pipeline's JSON-lines log file

pub mod config;
pub mod engine;
pub mod error;
pub mod plan;
pub mod reporter;
pub mod sink;
pub mod state;
pub mod supervisor;

pub use error::RunError;
pub use plan::{Plan, PlanRequest};
pub use supervisor::{Outcome, Supervisor};
