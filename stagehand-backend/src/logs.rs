//! Log Artifact Store
//!
//! Reads and removes the JSON-lines log files the runner writes into the
//! shared logs directory. The backend never writes log records itself.

use std::io;
use std::path::{Path, PathBuf};

use stagehand_core::dto::log::LogRecord;
use stagehand_core::pipeline_id;

#[derive(Debug, Clone)]
pub struct LogStore {
    dir: PathBuf,
}

impl LogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read every record of a pipeline's log file in arrival order.
    /// A missing file reads as empty; malformed lines are skipped.
    pub async fn read(&self, pipeline_file: &str) -> io::Result<Vec<LogRecord>> {
        let path = pipeline_id::log_file(&self.dir, pipeline_file);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut records = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<LogRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping malformed log line in {:?}: {}", path, e),
            }
        }

        Ok(records)
    }

    /// Remove a pipeline's log file and diagnostic dump, if present
    pub async fn remove_pipeline(&self, pipeline_file: &str) -> io::Result<()> {
        remove_if_exists(&pipeline_id::log_file(&self.dir, pipeline_file)).await?;
        remove_if_exists(&pipeline_id::error_file(&self.dir, pipeline_file)).await?;
        tracing::debug!("Removed log artifacts of {}", pipeline_file);
        Ok(())
    }

    /// Remove every file in the logs directory
    pub async fn clear(&self) -> io::Result<()> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                remove_if_exists(&entry.path()).await?;
            }
        }

        tracing::info!("Cleared logs directory {:?}", self.dir);
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
