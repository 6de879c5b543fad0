//! Snapshot refresh machinery
//!
//! Refreshes run either incrementally (only the entities touched by new or
//! changed events) or as a full rebuild on a periodic cadence. A refresh is
//! a read-modify-write: writers for one entity are serialized by a
//! per-entity lock, the mutation is audited with a bounded retry budget, and
//! on budget exhaustion the published snapshot is marked stale and the
//! failure surfaced to the caller.

use super::{fold_facility, fold_patient, fold_provider, SnapshotStore};
use crate::config::SnapshotConfig;
use crate::core::audit::AuditRecorder;
use crate::core::store::JourneyStore;
use crate::domain::event::JourneyEvent;
use crate::domain::ids::{EventId, FacilityId, PatientId, ProviderId};
use crate::domain::{AuditOperation, Result, SequencingError, SnapshotError};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Entities whose derived state changed during an ingest pass
#[derive(Debug, Default, Clone)]
pub struct TouchedEntities {
    /// Patients with new, corrected, or renumbered events
    pub patients: BTreeSet<PatientId>,

    /// Providers attributed on those events
    pub providers: BTreeSet<ProviderId>,

    /// Facilities attributed on those events
    pub facilities: BTreeSet<FacilityId>,
}

impl TouchedEntities {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the entities referenced by one event
    pub fn observe(&mut self, event: &JourneyEvent) {
        self.patients.insert(event.patient_id.clone());
        if let Some(provider_id) = &event.provider_id {
            self.providers.insert(provider_id.clone());
        }
        if let Some(facility_id) = &event.facility_id {
            self.facilities.insert(facility_id.clone());
        }
    }

    /// Absorbs another touched set
    pub fn merge(&mut self, other: TouchedEntities) {
        self.patients.extend(other.patients);
        self.providers.extend(other.providers);
        self.facilities.extend(other.facilities);
    }

    /// True when nothing was touched
    pub fn is_empty(&self) -> bool {
        self.patients.is_empty() && self.providers.is_empty() && self.facilities.is_empty()
    }
}

/// Outcome counts for a refresh pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStats {
    /// Snapshots successfully refreshed
    pub refreshed: usize,

    /// Snapshots whose refresh exhausted the retry budget
    pub failed: usize,
}

/// Folds derived journey state into entity snapshots
pub struct Materializer {
    snapshot_config: SnapshotConfig,
    store: Arc<JourneyStore>,
    snapshots: Arc<SnapshotStore>,
    recorder: Arc<AuditRecorder>,
    refresh_guards: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Materializer {
    /// Creates a materializer over the given stores
    pub fn new(
        snapshot_config: SnapshotConfig,
        store: Arc<JourneyStore>,
        snapshots: Arc<SnapshotStore>,
        recorder: Arc<AuditRecorder>,
    ) -> Self {
        Self {
            snapshot_config,
            store,
            snapshots,
            recorder,
            refresh_guards: StdMutex::new(HashMap::new()),
        }
    }

    /// The configured staleness bound
    pub fn staleness_bound(&self) -> Duration {
        Duration::from_secs(self.snapshot_config.refresh_interval_seconds)
    }

    /// Refreshes the snapshot of one patient
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::RefreshFailed`] after the retry budget is
    /// exhausted; the previously published snapshot is then marked stale.
    pub async fn refresh_patient(&self, patient_id: &PatientId) -> Result<()> {
        let guard = self.entity_guard(&format!("patient:{patient_id}"));
        let _serialized = guard.lock().await;

        let handle = self
            .store
            .existing_journey_handle(patient_id)
            .ok_or_else(|| SequencingError::UnknownPatient(patient_id.clone()))?;
        let snapshot = {
            let journey = handle.lock().await;
            fold_patient(&journey)
        };

        let before = match self.snapshots.patient(patient_id) {
            Some(existing) => Some(serde_json::to_value(&*existing)?),
            None => None,
        };
        let after = serde_json::to_value(&snapshot)?;

        match self
            .audit_with_retries("patient_snapshot", before, Some(after))
            .await
        {
            Ok(()) => {
                self.snapshots.publish_patient(snapshot);
                Ok(())
            }
            Err((attempts, detail)) => {
                self.snapshots.mark_patient_stale(patient_id);
                Err(SnapshotError::RefreshFailed {
                    entity: patient_id.to_string(),
                    attempts,
                    detail,
                }
                .into())
            }
        }
    }

    /// Refreshes the windowed snapshot of one provider
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::RefreshFailed`] after the retry budget is
    /// exhausted.
    pub async fn refresh_provider(&self, provider_id: &ProviderId) -> Result<()> {
        let (events, readmitted) = self.collect_events().await;
        self.refresh_provider_with(provider_id, &events, &readmitted, Utc::now())
            .await
    }

    /// Refreshes the windowed snapshot of one facility
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::RefreshFailed`] after the retry budget is
    /// exhausted.
    pub async fn refresh_facility(&self, facility_id: &FacilityId) -> Result<()> {
        let (events, readmitted) = self.collect_events().await;
        self.refresh_facility_with(facility_id, &events, &readmitted, Utc::now())
            .await
    }

    /// Refreshes every entity in the touched set
    ///
    /// Failures are counted, logged, and isolated: one entity's failed
    /// refresh never blocks the others.
    pub async fn refresh_touched(&self, touched: &TouchedEntities) -> RefreshStats {
        let mut stats = RefreshStats::default();

        for patient_id in &touched.patients {
            match self.refresh_patient(patient_id).await {
                Ok(()) => stats.refreshed += 1,
                Err(e) => {
                    tracing::warn!(patient_id = %patient_id, error = %e, "Patient snapshot refresh failed");
                    stats.failed += 1;
                }
            }
        }

        if !touched.providers.is_empty() || !touched.facilities.is_empty() {
            let (events, readmitted) = self.collect_events().await;
            let now = Utc::now();

            for provider_id in &touched.providers {
                match self
                    .refresh_provider_with(provider_id, &events, &readmitted, now)
                    .await
                {
                    Ok(()) => stats.refreshed += 1,
                    Err(e) => {
                        tracing::warn!(provider_id = %provider_id, error = %e, "Provider snapshot refresh failed");
                        stats.failed += 1;
                    }
                }
            }
            for facility_id in &touched.facilities {
                match self
                    .refresh_facility_with(facility_id, &events, &readmitted, now)
                    .await
                {
                    Ok(()) => stats.refreshed += 1,
                    Err(e) => {
                        tracing::warn!(facility_id = %facility_id, error = %e, "Facility snapshot refresh failed");
                        stats.failed += 1;
                    }
                }
            }
        }

        stats
    }

    /// Rebuilds every snapshot from the current journeys
    pub async fn full_rebuild(&self) -> RefreshStats {
        let mut touched = TouchedEntities::new();
        for patient_id in self.store.patient_ids() {
            touched.patients.insert(patient_id.clone());
            if let Some(handle) = self.store.existing_journey_handle(&patient_id) {
                let journey = handle.lock().await;
                for event in journey.events() {
                    touched.observe(event);
                }
            }
        }
        self.refresh_touched(&touched).await
    }

    /// Spawns the periodic full-rebuild task honoring the staleness bound
    ///
    /// The task stops when the shutdown signal flips to true.
    pub fn spawn_periodic(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.staleness_bound());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so a fresh pipeline
            // does not rebuild an empty store.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stats = self.full_rebuild().await;
                        tracing::debug!(
                            refreshed = stats.refreshed,
                            failed = stats.failed,
                            "Periodic snapshot rebuild complete"
                        );
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    async fn refresh_provider_with(
        &self,
        provider_id: &ProviderId,
        events: &[JourneyEvent],
        readmitted: &HashSet<EventId>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let guard = self.entity_guard(&format!("provider:{provider_id}"));
        let _serialized = guard.lock().await;

        let snapshot = fold_provider(
            provider_id,
            events,
            readmitted,
            self.snapshot_config.window_days,
            now,
        );
        let before = match self.snapshots.provider(provider_id) {
            Some(existing) => Some(serde_json::to_value(&*existing)?),
            None => None,
        };
        let after = serde_json::to_value(&snapshot)?;

        match self
            .audit_with_retries("provider_snapshot", before, Some(after))
            .await
        {
            Ok(()) => {
                self.snapshots.publish_provider(snapshot);
                Ok(())
            }
            Err((attempts, detail)) => {
                self.snapshots.mark_provider_stale(provider_id);
                Err(SnapshotError::RefreshFailed {
                    entity: provider_id.to_string(),
                    attempts,
                    detail,
                }
                .into())
            }
        }
    }

    async fn refresh_facility_with(
        &self,
        facility_id: &FacilityId,
        events: &[JourneyEvent],
        readmitted: &HashSet<EventId>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let guard = self.entity_guard(&format!("facility:{facility_id}"));
        let _serialized = guard.lock().await;

        let snapshot = fold_facility(
            facility_id,
            events,
            readmitted,
            self.snapshot_config.window_days,
            now,
        );
        let before = match self.snapshots.facility(facility_id) {
            Some(existing) => Some(serde_json::to_value(&*existing)?),
            None => None,
        };
        let after = serde_json::to_value(&snapshot)?;

        match self
            .audit_with_retries("facility_snapshot", before, Some(after))
            .await
        {
            Ok(()) => {
                self.snapshots.publish_facility(snapshot);
                Ok(())
            }
            Err((attempts, detail)) => {
                self.snapshots.mark_facility_stale(facility_id);
                Err(SnapshotError::RefreshFailed {
                    entity: facility_id.to_string(),
                    attempts,
                    detail,
                }
                .into())
            }
        }
    }

    /// One immutable pass over all journeys: live events plus the IDs of
    /// discharges that link to a readmission
    async fn collect_events(&self) -> (Vec<JourneyEvent>, HashSet<EventId>) {
        let mut events = Vec::new();
        let mut readmitted = HashSet::new();
        for patient_id in self.store.patient_ids() {
            if let Some(handle) = self.store.existing_journey_handle(&patient_id) {
                let journey = handle.lock().await;
                events.extend(journey.events().iter().cloned());
                readmitted.extend(journey.links().iter().map(|l| l.discharge_event_id.clone()));
            }
        }
        (events, readmitted)
    }

    /// The per-entity writer lock; last-writer-wins is not acceptable for
    /// snapshot updates, so every refresh is a serialized read-modify-write
    fn entity_guard(&self, key: &str) -> Arc<Mutex<()>> {
        let mut guards = self.refresh_guards.lock().expect("guard map lock poisoned");
        guards
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Retries the audit append within the bounded budget
    async fn audit_with_retries(
        &self,
        entity: &str,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> std::result::Result<(), (usize, String)> {
        let max_retries = self.snapshot_config.max_retries;
        let mut last_error = String::new();

        for attempt in 1..=max_retries {
            match self
                .recorder
                .record(entity, AuditOperation::Refresh, before.clone(), after.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(
                        entity = entity,
                        attempt = attempt,
                        max_retries = max_retries,
                        error = %e,
                        "Snapshot refresh audit failed"
                    );
                    if attempt < max_retries {
                        tokio::time::sleep(self.backoff_delay(attempt - 1)).await;
                    }
                }
            }
        }

        Err((max_retries, last_error))
    }

    /// Backoff for the given zero-based attempt, with jitter
    fn backoff_delay(&self, attempt: usize) -> Duration {
        let schedule = &self.snapshot_config.retry_backoff_ms;
        let base = schedule
            .get(attempt)
            .or_else(|| schedule.last())
            .copied()
            .unwrap_or(500);
        let jitter = if base >= 4 {
            rand::thread_rng().gen_range(0..=base / 4)
        } else {
            0
        };
        Duration::from_millis(base + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::audit::{FailingAuditSink, MemoryAuditSink};
    use crate::domain::event::{EventType, JourneyEventBuilder};
    use crate::domain::ids::EncounterId;

    fn patient_id() -> PatientId {
        PatientId::new("PAT000001").unwrap()
    }

    async fn seeded_store() -> Arc<JourneyStore> {
        let store = Arc::new(JourneyStore::new());
        let handle = store.journey_handle(&patient_id());
        let mut journey = handle.lock().await;
        let event = JourneyEventBuilder::new()
            .event_id(EventId::new("ADM1").unwrap())
            .patient_id(patient_id())
            .encounter_id(EncounterId::new("ENC1").unwrap())
            .event_type(EventType::Admission)
            .event_datetime(Utc::now())
            .provider_id(ProviderId::new("PROV001").unwrap())
            .facility_id(FacilityId::new("FAC001").unwrap())
            .source_system("test_feed")
            .build()
            .unwrap();
        journey.insert(event).unwrap();
        drop(journey);
        store
    }

    fn materializer(
        store: Arc<JourneyStore>,
        snapshots: Arc<SnapshotStore>,
        sink: Arc<dyn crate::adapters::audit::AuditSink>,
    ) -> Materializer {
        let mut config = SnapshotConfig::default();
        config.retry_backoff_ms = vec![1, 2];
        Materializer::new(
            config,
            store,
            snapshots,
            Arc::new(AuditRecorder::new(sink, "test")),
        )
    }

    #[tokio::test]
    async fn test_refresh_patient_publishes_snapshot() {
        let store = seeded_store().await;
        let snapshots = Arc::new(SnapshotStore::new());
        let sink = Arc::new(MemoryAuditSink::new());
        let materializer = materializer(store, snapshots.clone(), sink.clone());

        materializer.refresh_patient(&patient_id()).await.unwrap();

        let snapshot = snapshots.patient(&patient_id()).unwrap();
        assert_eq!(snapshot.total_encounters, 1);
        assert!(!snapshot.stale);
        // The refresh itself was audited
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.records()[0].operation, AuditOperation::Refresh);
    }

    #[tokio::test]
    async fn test_refresh_unknown_patient_fails() {
        let store = Arc::new(JourneyStore::new());
        let snapshots = Arc::new(SnapshotStore::new());
        let materializer = materializer(store, snapshots, Arc::new(MemoryAuditSink::new()));

        assert!(materializer.refresh_patient(&patient_id()).await.is_err());
    }

    #[tokio::test]
    async fn test_exhausted_retries_mark_snapshot_stale() {
        let store = seeded_store().await;
        let snapshots = Arc::new(SnapshotStore::new());

        // First publish a healthy snapshot
        let healthy = materializer(
            store.clone(),
            snapshots.clone(),
            Arc::new(MemoryAuditSink::new()),
        );
        healthy.refresh_patient(&patient_id()).await.unwrap();

        // Then fail a refresh through a broken sink
        let broken = materializer(store, snapshots.clone(), Arc::new(FailingAuditSink));
        let err = broken.refresh_patient(&patient_id()).await.unwrap_err();
        assert!(err.to_string().contains("after 3 attempts"));

        // The stale snapshot is surfaced as stale, not served as fresh
        let snapshot = snapshots.patient(&patient_id()).unwrap();
        assert!(snapshot.stale);
        assert_eq!(snapshot.total_encounters, 1);
    }

    #[tokio::test]
    async fn test_full_rebuild_covers_all_entities() {
        let store = seeded_store().await;
        let snapshots = Arc::new(SnapshotStore::new());
        let materializer = materializer(store, snapshots.clone(), Arc::new(MemoryAuditSink::new()));

        let stats = materializer.full_rebuild().await;
        // One patient, one provider, one facility
        assert_eq!(stats.refreshed, 3);
        assert_eq!(stats.failed, 0);
        assert!(snapshots.provider(&ProviderId::new("PROV001").unwrap()).is_some());
        assert!(snapshots.facility(&FacilityId::new("FAC001").unwrap()).is_some());
    }

    #[test]
    fn test_backoff_follows_schedule_with_bounded_jitter() {
        let store = Arc::new(JourneyStore::new());
        let snapshots = Arc::new(SnapshotStore::new());
        let mut config = SnapshotConfig::default();
        config.retry_backoff_ms = vec![100, 200];
        let materializer = Materializer::new(
            config,
            store,
            snapshots,
            Arc::new(AuditRecorder::new(Arc::new(MemoryAuditSink::new()), "test")),
        );

        let first = materializer.backoff_delay(0).as_millis() as u64;
        assert!((100..=125).contains(&first));
        // Past the end of the schedule the last entry repeats
        let beyond = materializer.backoff_delay(5).as_millis() as u64;
        assert!((200..=250).contains(&beyond));
    }
}
