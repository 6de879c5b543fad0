//! JSON-lines file event source
//!
//! Reads newline-delimited JSON payloads from a local file, one raw event per
//! line. A line that is not valid JSON is still delivered as a raw event
//! (wrapped under an `unparsed` key) so that the normalizer can reject it
//! into the dead-letter sink; the source never silently drops a record.

use super::traits::EventSource;
use crate::domain::{MeridianError, RawEvent, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Event source backed by a newline-delimited JSON file
pub struct JsonlEventSource {
    source_system: String,
    path: PathBuf,
    pending: VecDeque<serde_json::Value>,
    loaded: bool,
}

impl JsonlEventSource {
    /// Creates a source for the given file and source-system tag
    ///
    /// The file is read lazily on the first `next_batch` call.
    pub fn new(path: impl AsRef<Path>, source_system: impl Into<String>) -> Self {
        Self {
            source_system: source_system.into(),
            path: path.as_ref().to_path_buf(),
            pending: VecDeque::new(),
            loaded: false,
        }
    }

    async fn load(&mut self) -> Result<()> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MeridianError::Source(format!(
                "Failed to read event file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let payload = match serde_json::from_str(trimmed) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Unparseable source line; forwarding for dead-letter routing"
                    );
                    serde_json::json!({ "unparsed": trimmed })
                }
            };
            self.pending.push_back(payload);
        }

        tracing::debug!(
            path = %self.path.display(),
            records = self.pending.len(),
            "Loaded event file"
        );
        self.loaded = true;
        Ok(())
    }
}

#[async_trait]
impl EventSource for JsonlEventSource {
    fn source_system(&self) -> &str {
        &self.source_system
    }

    async fn next_batch(&mut self, max: usize) -> Result<Vec<RawEvent>> {
        if !self.loaded {
            self.load().await?;
        }

        let take = max.min(self.pending.len());
        let batch = self
            .pending
            .drain(..take)
            .map(|payload| RawEvent::new(self.source_system.clone(), payload))
            .collect();
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_reads_one_event_per_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{\"patient_id\": \"PAT000001\"}}").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{{\"patient_id\": \"PAT000002\"}}").unwrap();
        file.flush().unwrap();

        let mut source = JsonlEventSource::new(file.path(), "test_feed");
        let batch = source.next_batch(10).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].source_system, "test_feed");

        let next = source.next_batch(10).await.unwrap();
        assert!(next.is_empty());
    }

    #[tokio::test]
    async fn test_batch_size_respected() {
        let mut file = NamedTempFile::new().unwrap();
        for i in 0..5 {
            writeln!(file, "{{\"patient_id\": \"PAT{i:06}\"}}").unwrap();
        }
        file.flush().unwrap();

        let mut source = JsonlEventSource::new(file.path(), "test_feed");
        assert_eq!(source.next_batch(2).await.unwrap().len(), 2);
        assert_eq!(source.next_batch(2).await.unwrap().len(), 2);
        assert_eq!(source.next_batch(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_line_forwarded_not_dropped() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json at all").unwrap();
        file.flush().unwrap();

        let mut source = JsonlEventSource::new(file.path(), "test_feed");
        let batch = source.next_batch(10).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert!(batch[0].payload.get("unparsed").is_some());
    }

    #[tokio::test]
    async fn test_missing_file_is_source_error() {
        let mut source = JsonlEventSource::new("/nonexistent/events.jsonl", "test_feed");
        let err = source.next_batch(10).await.unwrap_err();
        assert!(matches!(err, MeridianError::Source(_)));
    }
}
