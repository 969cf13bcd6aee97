//! Log record DTOs

use serde::{Deserialize, Serialize};

/// One line of step output as stored in a pipeline's log file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub step: String,
    pub line: String,
}
