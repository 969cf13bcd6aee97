//! Core domain types
//!
//! Stages and steps as they are persisted by the backend and shown to the UI.
//! The runner only ever refers to them by logical name; numeric ids are
//! assigned by the store.

pub mod stage;
pub mod status;
