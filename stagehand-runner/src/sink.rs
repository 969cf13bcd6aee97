//! Pipeline log sink
//!
//! One append-only JSON-lines file per pipeline, shared by every step of the
//! run. Each step writes through its own [`StepWriter`]; a chunk is appended
//! as whole records under the file lock so concurrent steps never interleave
//! within a record.
//!
//! Writes are blocking. Callers on the async runtime hand them to the
//! blocking pool (see the podman output pump).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use stagehand_core::dto::log::LogRecord;
use stagehand_core::pipeline_id;

#[derive(Debug, Clone)]
pub struct LogSink {
    path: PathBuf,
    file: Arc<Mutex<Option<File>>>,
}

impl LogSink {
    /// Open (create or append to) the log file of a pipeline
    pub fn open(logs_dir: &Path, pipeline_file: &str) -> io::Result<Self> {
        let path = pipeline_id::log_file(logs_dir, pipeline_file);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::debug!("Opened log sink {:?}", path);

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(Some(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writer that tags every line with the step name
    pub fn writer(&self, step: impl Into<String>) -> StepWriter {
        StepWriter {
            step: step.into(),
            sink: self.clone(),
        }
    }

    /// Flush and close the file. Later writes fail.
    pub fn close(&self) -> io::Result<()> {
        let mut guard = self.lock()?;
        if let Some(mut file) = guard.take() {
            file.flush()?;
        }
        Ok(())
    }

    fn append(&self, step: &str, chunk: &[u8]) -> io::Result<()> {
        let decoded = String::from_utf8_lossy(chunk);
        let text = decoded.strip_suffix('\n').unwrap_or(decoded.as_ref());

        let mut buf = Vec::new();
        for line in text.split('\n') {
            let record = LogRecord {
                step: step.to_string(),
                line: line.trim_end_matches('\r').to_string(),
            };
            serde_json::to_writer(&mut buf, &record)?;
            buf.push(b'\n');
        }

        let mut guard = self.lock()?;
        let file = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "log sink is closed"))?;
        file.write_all(&buf)?;
        file.flush()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, Option<File>>> {
        self.file
            .lock()
            .map_err(|_| io::Error::other("log sink lock poisoned"))
    }
}

/// Per-step handle on a [`LogSink`]
#[derive(Debug, Clone)]
pub struct StepWriter {
    step: String,
    sink: LogSink,
}

impl StepWriter {
    pub fn step(&self) -> &str {
        &self.step
    }
}

impl Write for StepWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !buf.is_empty() {
            self.sink.append(&self.step, buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(sink: &LogSink) -> Vec<LogRecord> {
        std::fs::read_to_string(sink.path())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::open(dir.path(), "/src/.drone.yml").unwrap();

        let mut writer = sink.writer("build");
        writer.write_all(b"compiling\nfinished\n").unwrap();
        writer.write_all(b"last").unwrap();

        let lines: Vec<_> = records(&sink).into_iter().map(|r| r.line).collect();
        assert_eq!(lines, vec!["compiling", "finished", "last"]);
    }

    #[test]
    fn test_only_one_trailing_newline_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::open(dir.path(), "p").unwrap();
        sink.writer("build").write_all(b"a\n\n").unwrap();

        let lines: Vec<_> = records(&sink).into_iter().map(|r| r.line).collect();
        assert_eq!(lines, vec!["a", ""]);
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        LogSink::open(dir.path(), "p")
            .unwrap()
            .writer("one")
            .write_all(b"first")
            .unwrap();

        let sink = LogSink::open(dir.path(), "p").unwrap();
        sink.writer("two").write_all(b"second").unwrap();

        let steps: Vec<_> = records(&sink).into_iter().map(|r| r.step).collect();
        assert_eq!(steps, vec!["one", "two"]);
    }

    #[test]
    fn test_concurrent_writers_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::open(dir.path(), "p").unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let mut writer = sink.writer(format!("step-{i}"));
                std::thread::spawn(move || {
                    for n in 0..50 {
                        writer
                            .write_all(format!("line {n} of step-{i}\n").as_bytes())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let records = records(&sink);
        assert_eq!(records.len(), 200);
        for record in records {
            assert!(record.line.ends_with(&record.step));
        }
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::open(dir.path(), "p").unwrap();
        let mut writer = sink.writer("build");
        sink.close().unwrap();
        assert!(writer.write_all(b"late").is_err());
    }
}
