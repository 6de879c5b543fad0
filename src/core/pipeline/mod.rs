//! Pipeline coordinator - main orchestrator for the ingest process
//!
//! Pulls raw events from a source in batches and drives each record through
//! normalize, sequence, derive, and materialize, with the audit recorder
//! invoked before every mutation. Work fans out across patients up to the
//! configured parallelism while each patient's events are processed strictly
//! in arrival order under that patient's journey lock.

pub mod summary;

use crate::adapters::audit::AuditSink;
use crate::adapters::deadletter::{DeadLetterEntry, DeadLetterSink};
use crate::adapters::source::EventSource;
use crate::config::MeridianConfig;
use crate::core::audit::AuditRecorder;
use crate::core::derive::DerivationEngine;
use crate::core::materialize::{Materializer, SnapshotStore, TouchedEntities};
use crate::core::normalize::Normalizer;
use crate::core::query::QueryService;
use crate::core::store::JourneyStore;
use crate::domain::errors::{NormalizeError, SequencingError};
use crate::domain::event::{JourneyEvent, RawEvent};
use crate::domain::patient::Demographics;
use crate::domain::{AuditOperation, PatientId, Result};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use summary::{IngestError, IngestErrorKind, IngestSummary};
use tokio::sync::watch;

/// Records pulled from the source per batch
const INGEST_BATCH_SIZE: usize = 500;

/// Per-patient outcome of one batch
struct PatientOutcome {
    inserted: usize,
    superseded: usize,
    conflicts: usize,
    touched: TouchedEntities,
    errors: Vec<IngestError>,
}

impl PatientOutcome {
    fn new() -> Self {
        Self {
            inserted: 0,
            superseded: 0,
            conflicts: 0,
            touched: TouchedEntities::new(),
            errors: Vec::new(),
        }
    }
}

/// Pipeline coordinator
pub struct PipelineCoordinator {
    config: MeridianConfig,
    normalizer: Normalizer,
    derivation: DerivationEngine,
    store: Arc<JourneyStore>,
    snapshots: Arc<SnapshotStore>,
    materializer: Arc<Materializer>,
    recorder: Arc<AuditRecorder>,
    dead_letter: Arc<dyn DeadLetterSink>,
}

impl PipelineCoordinator {
    /// Creates a coordinator with fresh stores over the given sinks
    pub fn new(
        config: MeridianConfig,
        dead_letter: Arc<dyn DeadLetterSink>,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Self {
        let recorder = Arc::new(AuditRecorder::new(audit_sink, config.audit.actor.clone()));
        let store = Arc::new(JourneyStore::new());
        let snapshots = Arc::new(SnapshotStore::new());
        let materializer = Arc::new(Materializer::new(
            config.snapshots.clone(),
            store.clone(),
            snapshots.clone(),
            recorder.clone(),
        ));

        Self {
            normalizer: Normalizer::new(),
            derivation: DerivationEngine::new(config.pipeline.clone()),
            store,
            snapshots,
            materializer,
            recorder,
            dead_letter,
            config,
        }
    }

    /// The journey store backing this pipeline
    pub fn store(&self) -> Arc<JourneyStore> {
        self.store.clone()
    }

    /// The snapshot store backing this pipeline
    pub fn snapshots(&self) -> Arc<SnapshotStore> {
        self.snapshots.clone()
    }

    /// The materializer, for periodic rebuilds or on-demand refreshes
    pub fn materializer(&self) -> Arc<Materializer> {
        self.materializer.clone()
    }

    /// Read-only query boundary over this pipeline's state
    pub fn query(&self) -> QueryService {
        QueryService::new(self.store.clone(), self.snapshots.clone())
    }

    /// Drains a source through the full pipeline
    ///
    /// Processes batches until the source is exhausted or the shutdown
    /// signal flips; the batch in flight always completes, so no patient is
    /// left with a half-applied renumbering.
    ///
    /// # Errors
    ///
    /// Returns an error only for source transport failures; per-record and
    /// per-entity failures are captured in the summary instead.
    pub async fn run(
        &self,
        source: &mut dyn EventSource,
        shutdown: watch::Receiver<bool>,
    ) -> Result<IngestSummary> {
        let start_time = Instant::now();
        let mut summary = IngestSummary::new();

        if let Err(e) = self.config.validate() {
            summary.add_error(IngestError::new(IngestErrorKind::Configuration, e));
            return Ok(summary.with_duration(start_time.elapsed()));
        }

        tracing::info!(
            source_system = source.source_system(),
            "Starting ingest run"
        );

        let mut patients_touched: HashSet<PatientId> = HashSet::new();
        loop {
            if *shutdown.borrow() {
                tracing::info!("Shutdown requested; stopping after completed batch");
                break;
            }

            let batch = source.next_batch(INGEST_BATCH_SIZE).await?;
            if batch.is_empty() {
                break;
            }

            let touched = self.ingest_batch(batch, &mut summary).await;
            patients_touched.extend(touched.patients.iter().cloned());
        }

        summary.patients_touched = patients_touched.len();
        Ok(summary.with_duration(start_time.elapsed()))
    }

    /// Ingests one batch of raw events, returning the touched entities
    pub async fn ingest_batch(
        &self,
        batch: Vec<RawEvent>,
        summary: &mut IngestSummary,
    ) -> TouchedEntities {
        summary.total_raw += batch.len();

        // Normalize sequentially: arrival order is the sequencer's tie-break
        // and must be preserved per patient.
        let mut group_index: HashMap<PatientId, usize> = HashMap::new();
        let mut groups: Vec<(PatientId, Vec<(JourneyEvent, Option<Demographics>)>)> = Vec::new();
        for raw in &batch {
            match self.normalizer.normalize(raw) {
                Ok((event, _flags)) => {
                    summary.normalized += 1;
                    let demographics = self.normalizer.demographics(raw);
                    let patient_id = event.patient_id.clone();
                    let index = *group_index.entry(patient_id.clone()).or_insert_with(|| {
                        groups.push((patient_id, Vec::new()));
                        groups.len() - 1
                    });
                    groups[index].1.push((event, demographics));
                }
                Err(reason) => {
                    self.route_to_dead_letter(raw, &reason, summary).await;
                }
            }
        }

        // Fan out across patients; each patient's events stay in order
        // inside a single task.
        let outcomes: Vec<PatientOutcome> = stream::iter(
            groups
                .into_iter()
                .map(|(patient_id, items)| async move {
                    self.process_patient(&patient_id, items).await
                }),
        )
        .buffer_unordered(self.config.pipeline.parallel_patients)
        .collect()
        .await;

        let mut touched = TouchedEntities::new();
        for outcome in outcomes {
            summary.events_inserted += outcome.inserted;
            summary.events_superseded += outcome.superseded;
            summary.sequencing_conflicts += outcome.conflicts;
            for error in outcome.errors {
                summary.add_error(error);
            }
            touched.merge(outcome.touched);
        }

        let stats = self.materializer.refresh_touched(&touched).await;
        summary.snapshots_refreshed += stats.refreshed;
        summary.snapshots_failed += stats.failed;

        touched
    }

    /// Sequences and derives one patient's events under that patient's lock
    ///
    /// An error in here never affects another patient's processing; every
    /// failure is captured in the outcome and surfaced through the summary.
    async fn process_patient(
        &self,
        patient_id: &PatientId,
        items: Vec<(JourneyEvent, Option<Demographics>)>,
    ) -> PatientOutcome {
        let mut outcome = PatientOutcome::new();

        // Fold the batch's demographic updates, later records winning
        let mut demographics: Option<Demographics> = None;
        for (_, incoming) in &items {
            if let Some(incoming) = incoming {
                demographics
                    .get_or_insert_with(Demographics::default)
                    .merge(incoming);
            }
        }

        if let Err(e) = self
            .store
            .upsert_patient(patient_id, demographics, &self.recorder)
            .await
        {
            outcome.errors.push(
                IngestError::new(IngestErrorKind::Audit, e.to_string())
                    .with_context(format!("patient={patient_id}")),
            );
        }

        let handle = self.store.journey_handle(patient_id);
        let mut journey = handle.lock().await;

        for (event, _) in items {
            outcome.touched.observe(&event);

            let (operation, before) = match journey.event_by_id(&event.event_id) {
                Some(existing) => (
                    AuditOperation::Supersede,
                    serde_json::to_value(existing).ok(),
                ),
                None => (AuditOperation::Insert, None),
            };
            let after = serde_json::to_value(&event).ok();
            if let Err(e) = self
                .recorder
                .record("journey_event", operation, before, after)
                .await
            {
                // No audit record, no write
                outcome.errors.push(
                    IngestError::new(IngestErrorKind::Audit, e.to_string())
                        .with_context(format!("event={}", event.event_id)),
                );
                continue;
            }

            let retry = event.clone();
            match journey.insert(event) {
                Ok(insert_outcome) => {
                    if insert_outcome.superseded_version.is_some() {
                        outcome.superseded += 1;
                    } else {
                        outcome.inserted += 1;
                    }
                    self.derivation.recompute(&mut journey, insert_outcome.position);
                }
                Err(SequencingError::Conflict { detail, .. }) => {
                    outcome.conflicts += 1;
                    tracing::error!(
                        patient_id = %patient_id,
                        detail = %detail,
                        "Sequencing conflict; re-sequencing patient"
                    );

                    journey.resequence();
                    if let Err(e) = self
                        .recorder
                        .record(
                            "journey",
                            AuditOperation::Resequence,
                            None,
                            Some(serde_json::json!({
                                "patient_id": patient_id.as_str(),
                                "events": journey.len(),
                                "detail": detail,
                            })),
                        )
                        .await
                    {
                        outcome.errors.push(
                            IngestError::new(IngestErrorKind::Audit, e.to_string())
                                .with_context(format!("patient={patient_id}")),
                        );
                    }
                    self.derivation.recompute(&mut journey, 0);

                    match journey.insert(retry) {
                        Ok(insert_outcome) => {
                            outcome.inserted += 1;
                            self.derivation
                                .recompute(&mut journey, insert_outcome.position);
                        }
                        Err(e) => {
                            outcome.errors.push(
                                IngestError::new(IngestErrorKind::Sequencing, e.to_string())
                                    .with_context(format!("patient={patient_id}")),
                            );
                        }
                    }
                }
                Err(e) => {
                    outcome.errors.push(
                        IngestError::new(IngestErrorKind::Sequencing, e.to_string())
                            .with_context(format!("patient={patient_id}")),
                    );
                }
            }
        }

        outcome
    }

    /// Pushes a malformed record to the dead-letter sink within the bounded
    /// retry budget
    async fn route_to_dead_letter(
        &self,
        raw: &RawEvent,
        reason: &NormalizeError,
        summary: &mut IngestSummary,
    ) {
        let entry = DeadLetterEntry::from_raw(raw, reason.to_string());
        let max_retries = self.config.ingest.max_retries;

        for attempt in 1..=max_retries {
            match self.dead_letter.push(&entry).await {
                Ok(()) => {
                    summary.dead_lettered += 1;
                    tracing::debug!(
                        source_system = %raw.source_system,
                        reason = %reason,
                        "Routed record to dead-letter sink"
                    );
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt,
                        max_retries = max_retries,
                        error = %e,
                        "Dead-letter push failed"
                    );
                    if attempt < max_retries {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            50 * (1 << (attempt - 1)),
                        ))
                        .await;
                    } else {
                        summary.add_error(
                            IngestError::new(IngestErrorKind::DeadLetter, e.to_string())
                                .with_context(format!("source={}", raw.source_system)),
                        );
                    }
                }
            }
        }
    }
}
