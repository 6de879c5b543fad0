//! External integrations for Meridian.
//!
//! Everything outside the core pipeline sits behind a trait defined here:
//! ingestion sources, the dead-letter sink, and the audit sink. File-backed
//! JSON-lines implementations are provided for each, plus in-memory variants
//! for tests.

pub mod audit;
pub mod deadletter;
pub mod source;

pub use audit::{AuditSink, FailingAuditSink, JsonlAuditSink, MemoryAuditSink};
pub use deadletter::{DeadLetterEntry, DeadLetterSink, JsonlDeadLetterSink, MemoryDeadLetterSink};
pub use source::{EventSource, JsonlEventSource};
