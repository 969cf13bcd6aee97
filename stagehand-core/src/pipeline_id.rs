//! Pipeline identity hashing
//!
//! Log artifacts are named after a hash of the pipeline file identity so the
//! runner (writer) and the backend (reader, cleaner) agree on file names
//! without sharing any state.

use std::path::{Path, PathBuf};

/// Hex digest identifying a pipeline file
pub fn pipeline_id(pipeline_file: &str) -> String {
    let hash = blake3::hash(pipeline_file.as_bytes());
    hash.to_hex()[..32].to_string()
}

/// Path of the pipeline's log file inside `logs_dir`
pub fn log_file(logs_dir: &Path, pipeline_file: &str) -> PathBuf {
    logs_dir.join(format!("{}.json", pipeline_id(pipeline_file)))
}

/// Path of the pipeline's diagnostic dump inside `logs_dir`
pub fn error_file(logs_dir: &Path, pipeline_file: &str) -> PathBuf {
    logs_dir.join(format!("{}-err.json", pipeline_id(pipeline_file)))
}
