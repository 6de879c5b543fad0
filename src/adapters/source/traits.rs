//! Event source abstraction
//!
//! This module defines the trait that ingestion connectors must implement to
//! feed raw events into the pipeline. The core requires only that each
//! delivered payload can be offered to the normalizer; it makes no
//! assumptions about transport or format beyond that.

use crate::domain::{RawEvent, Result};
use async_trait::async_trait;

/// A stream of raw event records from one source system
///
/// Implementations are the only suspension points on the ingestion side of
/// the pipeline; the pipeline logic itself is synchronous and CPU-bound.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// The declared source-system tag for records from this source
    fn source_system(&self) -> &str;

    /// Fetches the next batch of raw events, up to `max` records
    ///
    /// An empty batch signals that the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transport fails.
    async fn next_batch(&mut self, max: usize) -> Result<Vec<RawEvent>>;
}
