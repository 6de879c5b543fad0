//! Dead-letter sink for unrecoverable normalization failures
//!
//! Raw records that cannot be normalized (missing patient identifier,
//! unparseable timestamp) are routed here with the original payload and the
//! failure reason, and never retried by the core.

use crate::domain::{MeridianError, RawEvent, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One dead-lettered record with its failure reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    /// Source-system tag of the failed record
    pub source_system: String,

    /// The original payload, untouched
    pub payload: serde_json::Value,

    /// Why normalization rejected the record
    pub reason: String,

    /// When the record was originally received
    pub received_at: DateTime<Utc>,

    /// When the record was dead-lettered
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    /// Builds an entry from the failed raw event and its rejection reason
    pub fn from_raw(raw: &RawEvent, reason: impl Into<String>) -> Self {
        Self {
            source_system: raw.source_system.clone(),
            payload: raw.payload.clone(),
            reason: reason.into(),
            received_at: raw.received_at,
            dead_lettered_at: Utc::now(),
        }
    }
}

/// External sink for records the pipeline cannot normalize
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Pushes one entry to the sink
    ///
    /// # Errors
    ///
    /// Returns an error if the sink is unavailable; callers retry within a
    /// bounded budget.
    async fn push(&self, entry: &DeadLetterEntry) -> Result<()>;
}

/// Dead-letter sink appending JSON lines to a local file
pub struct JsonlDeadLetterSink {
    path: PathBuf,
}

impl JsonlDeadLetterSink {
    /// Creates a sink writing to the given path, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MeridianError::DeadLetter(format!(
                        "Failed to create dead-letter directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(Self { path })
    }
}

#[async_trait]
impl DeadLetterSink for JsonlDeadLetterSink {
    async fn push(&self, entry: &DeadLetterEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                MeridianError::DeadLetter(format!(
                    "Failed to open dead-letter file {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        let line = serde_json::to_string(entry)
            .map_err(|e| MeridianError::DeadLetter(format!("Failed to serialize entry: {e}")))?;
        writeln!(file, "{line}")
            .map_err(|e| MeridianError::DeadLetter(format!("Failed to write entry: {e}")))?;
        Ok(())
    }
}

/// In-memory dead-letter sink for tests
#[derive(Default)]
pub struct MemoryDeadLetterSink {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl MemoryDeadLetterSink {
    /// Creates an empty in-memory sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything pushed so far
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().expect("dead-letter lock poisoned").clone()
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetterSink {
    async fn push(&self, entry: &DeadLetterEntry) -> Result<()> {
        self.entries
            .lock()
            .expect("dead-letter lock poisoned")
            .push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_jsonl_sink_appends_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dlq.jsonl");
        let sink = JsonlDeadLetterSink::new(&path).unwrap();

        let raw = RawEvent::new("test_feed", json!({"timestamp": "2025-03-01T08:00:00Z"}));
        let entry = DeadLetterEntry::from_raw(&raw, "Raw event carries no patient identifier");
        sink.push(&entry).await.unwrap();
        sink.push(&entry).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let parsed: DeadLetterEntry = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.source_system, "test_feed");
        assert!(parsed.reason.contains("patient identifier"));
    }

    #[tokio::test]
    async fn test_memory_sink_records_pushes() {
        let sink = MemoryDeadLetterSink::new();
        let raw = RawEvent::new("test_feed", json!({}));
        sink.push(&DeadLetterEntry::from_raw(&raw, "reason"))
            .await
            .unwrap();
        assert_eq!(sink.entries().len(), 1);
    }
}
