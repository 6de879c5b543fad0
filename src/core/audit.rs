//! Audit recorder - the write interceptor for all state mutations
//!
//! Every mutating call path in the pipeline invokes the recorder explicitly
//! before committing its change, making the audit dependency visible rather
//! than implicit. A failure to record fails the triggering write; the
//! recorder itself performs no business validation.

use crate::adapters::audit::AuditSink;
use crate::domain::{AuditOperation, AuditRecord, Result};
use std::sync::Arc;

/// Records every mutation to normalized and aggregate state
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
    actor: String,
}

impl AuditRecorder {
    /// Creates a recorder writing to the given sink under the given actor
    /// identity
    pub fn new(sink: Arc<dyn AuditSink>, actor: impl Into<String>) -> Self {
        Self {
            sink,
            actor: actor.into(),
        }
    }

    /// Records one mutation, synchronously, before it is considered durable
    ///
    /// # Errors
    ///
    /// Returns an error when the sink cannot make the record durable; the
    /// caller must treat the triggering write as failed.
    pub async fn record(
        &self,
        entity: &str,
        operation: AuditOperation,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Result<()> {
        let record = AuditRecord::new(entity, operation, before, after, self.actor.clone());
        self.sink.append(&record).await?;
        tracing::trace!(
            entity = entity,
            operation = %operation,
            record_id = %record.record_id,
            "Recorded mutation"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::audit::{FailingAuditSink, MemoryAuditSink};
    use serde_json::json;

    #[tokio::test]
    async fn test_record_reaches_sink() {
        let sink = Arc::new(MemoryAuditSink::new());
        let recorder = AuditRecorder::new(sink.clone(), "test-actor");

        recorder
            .record(
                "journey_event",
                AuditOperation::Insert,
                None,
                Some(json!({"event_id": "EVT001"})),
            )
            .await
            .unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].actor, "test-actor");
        assert_eq!(records[0].entity, "journey_event");
    }

    #[tokio::test]
    async fn test_sink_failure_propagates() {
        let recorder = AuditRecorder::new(Arc::new(FailingAuditSink), "test-actor");
        let result = recorder
            .record("patient", AuditOperation::Update, None, None)
            .await;
        assert!(result.is_err());
    }
}
