//! Data Transfer Objects for the status API
//!
//! Wire types exchanged between the runner, the backend and UI clients.

pub mod log;
pub mod stage;
pub mod status;
