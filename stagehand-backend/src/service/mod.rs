//! Service Module
//!
//! Business logic layer for the status store.
//! Services run repository calls inside transactions and keep log artifacts
//! in step with the stage rows they belong to.

pub mod stage;
pub mod status;

// Re-export for convenience
pub use stage as stage_service;
pub use status as status_service;

/// Service error type
#[derive(Debug)]
pub enum StageError {
    NotFound(i64),
    Conflict(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
    IoError(std::io::Error),
}

impl From<sqlx::Error> for StageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StageError::Conflict(db.message().to_string())
            }
            _ => StageError::DatabaseError(err),
        }
    }
}

impl From<std::io::Error> for StageError {
    fn from(err: std::io::Error) -> Self {
        StageError::IoError(err)
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageError::NotFound(id) => write!(f, "Stage {} not found", id),
            StageError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            StageError::ValidationError(msg) => write!(f, "Invalid request: {}", msg),
            StageError::DatabaseError(err) => write!(f, "Database error: {}", err),
            StageError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, StageError>;
