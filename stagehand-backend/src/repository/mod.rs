//! Repository Module
//!
//! Data access layer for the status store.
//! Every function takes a connection so callers decide whether it runs inside
//! a transaction.

pub mod stage;
pub mod step;

// Re-export for convenience
pub use stage as stage_repository;
pub use step as step_repository;
