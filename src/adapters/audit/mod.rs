//! Audit sinks for the lineage trail
//!
//! Sinks are append-only: the pipeline never deletes or rewrites audit
//! history, and external compliance tooling consumes the records as written.

use crate::domain::{AuditRecord, MeridianError, Result};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only destination for audit records
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends one record
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be made durable; the caller
    /// must fail the triggering write.
    async fn append(&self, record: &AuditRecord) -> Result<()>;
}

/// Audit sink appending JSON lines to a local file
pub struct JsonlAuditSink {
    path: PathBuf,
}

impl JsonlAuditSink {
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
                    MeridianError::Audit(format!(
                        "Failed to create audit directory {}: {}",
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
impl AuditSink for JsonlAuditSink {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                MeridianError::Audit(format!(
                    "Failed to open audit file {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        let line = serde_json::to_string(record)
            .map_err(|e| MeridianError::Audit(format!("Failed to serialize record: {e}")))?;
        writeln!(file, "{line}")
            .map_err(|e| MeridianError::Audit(format!("Failed to write record: {e}")))?;
        Ok(())
    }
}

/// In-memory audit sink for tests
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Creates an empty in-memory sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything appended so far
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit lock poisoned").clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        self.records
            .lock()
            .expect("audit lock poisoned")
            .push(record.clone());
        Ok(())
    }
}

/// Audit sink that always fails; used to test the fail-the-write contract
#[derive(Default)]
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn append(&self, _record: &AuditRecord) -> Result<()> {
        Err(MeridianError::Audit("audit sink unavailable".to_string()))
    }
}
