//! Test utilities for creating temporary log files and capturing engine output.

use crate::output::{LineSink, TailEvent};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct TempLogFile {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TempLogFile {
    /// Create a new empty temporary log file
    pub fn new() -> std::io::Result<Self> {
        let temp_file = Self::missing()?;
        File::create(&temp_file.path)?;
        Ok(temp_file)
    }

    /// Reserve a path in a fresh temporary directory without creating the file
    pub fn missing() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("test.log");
        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Create a temporary log file with initial content, written verbatim
    pub fn with_content(content: &str) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        temp_file.append(content)?;
        Ok(temp_file)
    }

    /// Append raw content; no newline is added
    pub fn append(&self, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Truncate the file in place, keeping its identity
    pub fn truncate(&self) -> std::io::Result<()> {
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(())
    }

    /// Remove the file and create a new one with `content` at the same path
    pub fn rotate(&self, content: &str) -> std::io::Result<()> {
        self.remove()?;
        let mut file = File::create(&self.path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn remove(&self) -> std::io::Result<()> {
        std::fs::remove_file(&self.path)
    }

    /// Get the path to the temporary file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Receiving end for lines emitted through a test sink.
pub struct LineCollector(pub mpsc::Receiver<String>);

impl LineCollector {
    /// Everything already delivered, without waiting
    pub fn collect_now(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.0.try_recv() {
            lines.push(line);
        }
        lines
    }
}

pub struct TestSink {
    pub sink: LineSink,
    pub lines: LineCollector,
    pub events: mpsc::Receiver<TailEvent>,
    pub shutdown: CancellationToken,
}

/// A sink with roomy channels so tests can inspect output after the fact
pub fn test_sink(capacity: usize) -> TestSink {
    let (line_tx, line_rx) = mpsc::channel(capacity);
    let (event_tx, event_rx) = mpsc::channel(capacity);
    let shutdown = CancellationToken::new();
    let sink = LineSink::new(
        line_tx,
        Some(event_tx),
        shutdown.clone(),
        Duration::from_millis(200),
    );
    TestSink {
        sink,
        lines: LineCollector(line_rx),
        events: event_rx,
        shutdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_log_file_creation() {
        let temp_file = TempLogFile::new().unwrap();
        assert!(temp_file.path().exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_created() {
        let temp_file = TempLogFile::missing().unwrap();
        assert!(!temp_file.path().exists());
        assert!(temp_file.path().parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_append_is_verbatim() {
        let temp_file = TempLogFile::with_content("line 1\n").unwrap();
        temp_file.append("partial").unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "line 1\npartial");
    }

    #[tokio::test]
    async fn test_truncate() {
        let temp_file = TempLogFile::with_content("initial content").unwrap();
        temp_file.truncate().unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn test_rotate_replaces_content() {
        let temp_file = TempLogFile::with_content("old\n").unwrap();
        temp_file.rotate("new\n").unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "new\n");
    }
}
