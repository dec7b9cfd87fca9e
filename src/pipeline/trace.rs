// Pipeline trace
// Append-only JSONL log of long-running pipeline operations (training
// runs, transport lifecycle), for monitoring and post-mortems

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One line of the trace file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// ISO 8601 timestamp of when this entry was created
    pub timestamp: String,

    /// Operation name (e.g. "training", "transport")
    pub stage: String,

    /// Progress [0.0, 1.0]; long operations write 0.0 at start and 1.0
    /// at completion
    pub progress: f32,

    /// Human-readable description
    pub message: String,

    /// Optional structured payload (accuracies, sample counts, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    pub fn new(stage: impl Into<String>, progress: f32, message: impl Into<String>) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            stage: stage.into(),
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(
        stage: impl Into<String>,
        progress: f32,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        let mut entry = TraceEntry::new(stage, progress, message);
        entry.data = Some(data);
        entry
    }

    fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Append-only JSONL trace writer
#[derive(Debug, Clone)]
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append one entry, creating the file on first write
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        file.write_all(entry.to_json_line()?.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Append a batch of entries in one open
    pub fn write_all(&self, entries: &[TraceEntry]) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        for entry in entries {
            file.write_all(entry.to_json_line()?.as_bytes())?;
        }
        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read all entries back from a trace file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(line)?);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_trace_entry_creation() {
        let entry = TraceEntry::new("training", 0.5, "fitting forest");
        assert_eq!(entry.stage, "training");
        assert_eq!(entry.progress, 0.5);
        assert!(entry.data.is_none());
    }

    #[test]
    fn test_progress_clamping() {
        assert_eq!(TraceEntry::new("training", -0.5, "x").progress, 0.0);
        assert_eq!(TraceEntry::new("training", 1.5, "x").progress, 1.0);
    }

    #[test]
    fn test_write_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("trace.jsonl");
        let writer = TraceWriter::new(path.clone());

        writer
            .write(&TraceEntry::new("training", 0.0, "started"))
            .unwrap();
        writer
            .write(&TraceEntry::with_data(
                "training",
                1.0,
                "completed",
                serde_json::json!({ "test_accuracy": 0.91 }),
            ))
            .unwrap();

        let entries = read_trace_file(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].progress, 0.0);
        assert_eq!(entries[1].data.as_ref().unwrap()["test_accuracy"], 0.91);
    }
}
