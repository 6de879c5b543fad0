//! Ingest summary and reporting
//!
//! This module defines structures for tracking and reporting the outcome of
//! one ingest run.

use std::time::Duration;

/// Classification of an ingest-time error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestErrorKind {
    /// Configuration rejected before any processing
    Configuration,
    /// Event source failure
    Source,
    /// Dead-letter sink failure after retries
    DeadLetter,
    /// Audit recording failure; the triggering write was abandoned
    Audit,
    /// Sequencing conflict that re-sequencing could not absorb
    Sequencing,
    /// Snapshot refresh failure after retries
    Snapshot,
    /// Anything else
    Unknown,
}

/// One error captured during an ingest run
#[derive(Debug, Clone)]
pub struct IngestError {
    /// What failed
    pub kind: IngestErrorKind,

    /// Human-readable description
    pub message: String,

    /// Optional context (patient ID, event ID, file)
    pub context: Option<String>,
}

impl IngestError {
    /// Creates a new ingest error
    pub fn new(kind: IngestErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Attaches context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Summary of one ingest run
#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    /// Raw records pulled from the source
    pub total_raw: usize,

    /// Records normalized into canonical events
    pub normalized: usize,

    /// Records routed to the dead-letter sink
    pub dead_lettered: usize,

    /// New events inserted into journeys
    pub events_inserted: usize,

    /// Corrected events that superseded an earlier version
    pub events_superseded: usize,

    /// Sequencing conflicts recovered by per-patient re-sequencing
    pub sequencing_conflicts: usize,

    /// Distinct patients whose journeys changed
    pub patients_touched: usize,

    /// Snapshots successfully refreshed
    pub snapshots_refreshed: usize,

    /// Snapshots left stale after exhausting the refresh retry budget
    pub snapshots_failed: usize,

    /// Wall-clock duration of the run
    pub duration: Duration,

    /// Errors encountered during the run
    pub errors: Vec<IngestError>,
}

impl IngestSummary {
    /// Creates a new empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Adds an error
    pub fn add_error(&mut self, error: IngestError) {
        self.errors.push(error);
    }

    /// True when the run completed without errors or stale snapshots
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty() && self.snapshots_failed == 0
    }

    /// Logs the summary at info level
    pub fn log_summary(&self) {
        tracing::info!(
            total_raw = self.total_raw,
            normalized = self.normalized,
            dead_lettered = self.dead_lettered,
            events_inserted = self.events_inserted,
            events_superseded = self.events_superseded,
            sequencing_conflicts = self.sequencing_conflicts,
            patients_touched = self.patients_touched,
            snapshots_refreshed = self.snapshots_refreshed,
            snapshots_failed = self.snapshots_failed,
            errors = self.errors.len(),
            duration_ms = self.duration.as_millis() as u64,
            "Ingest run complete"
        );
        for error in &self.errors {
            tracing::warn!(
                kind = ?error.kind,
                context = error.context.as_deref().unwrap_or("-"),
                "{}",
                error.message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summary_is_successful() {
        let summary = IngestSummary::new();
        assert!(summary.is_successful());
    }

    #[test]
    fn test_errors_or_stale_snapshots_fail_the_run() {
        let mut summary = IngestSummary::new();
        summary.add_error(IngestError::new(IngestErrorKind::Audit, "sink down"));
        assert!(!summary.is_successful());

        let mut summary = IngestSummary::new();
        summary.snapshots_failed = 1;
        assert!(!summary.is_successful());
    }

    #[test]
    fn test_error_context_builder() {
        let error = IngestError::new(IngestErrorKind::Sequencing, "conflict")
            .with_context("patient=PAT000001");
        assert_eq!(error.context.as_deref(), Some("patient=PAT000001"));
    }
}
