//! Aggregate materializer
//!
//! Folds per-patient derived facts into entity-level rolling snapshots. The
//! fold functions here are pure over an immutable view of the journeys; the
//! refresh machinery in [`refresh`] decides when they run, serializes
//! writers per entity, and publishes results atomically so readers never see
//! a torn snapshot.

pub mod refresh;

use crate::core::normalize::codes;
use crate::core::sequence::PatientJourney;
use crate::domain::event::{EventType, JourneyEvent};
use crate::domain::ids::{EventId, FacilityId, PatientId, ProviderId};
use crate::domain::snapshot::{
    FacilityUtilizationSnapshot, PatientMetricsSnapshot, ProviderPerformanceSnapshot,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

pub use refresh::{Materializer, RefreshStats, TouchedEntities};

/// Folds one journey into its patient snapshot
pub fn fold_patient(journey: &PatientJourney) -> PatientMetricsSnapshot {
    let events = journey.events();
    let links = journey.links();

    let mut encounters = HashSet::new();
    let mut unkeyed_events = 0u64;
    let mut chronic_codes = HashSet::new();
    let mut total_cost = 0.0;
    let mut los_values = Vec::new();
    let mut score_values = Vec::new();

    for event in events {
        match &event.encounter_id {
            Some(encounter_id) => {
                encounters.insert(encounter_id.clone());
            }
            None => unkeyed_events += 1,
        }
        if let Some(code) = &event.diagnosis_code {
            if codes::is_chronic_code(code) {
                chronic_codes.insert(code.clone());
            }
        }
        if let Some(cost) = event.cost_amount {
            total_cost += cost;
        }
        if event.event_type == EventType::Discharge {
            if let Some(los) = event.length_of_stay_hours {
                los_values.push(los);
            }
            if let Some(score) = event.quality_score {
                score_values.push(score);
            }
        }
    }

    PatientMetricsSnapshot {
        patient_id: journey.patient_id().clone(),
        total_encounters: encounters.len() as u64 + unkeyed_events,
        first_encounter_at: events.iter().map(|e| e.event_datetime).min(),
        last_encounter_at: events.iter().map(|e| e.event_datetime).max(),
        average_los_hours: mean(&los_values),
        total_cost,
        average_quality_score: mean(&score_values),
        readmission_30_day: links.iter().any(|l| l.is_30_day),
        readmission_90_day: links.iter().any(|l| l.is_90_day),
        chronic_condition_count: chronic_codes.len() as u64,
        last_updated: Utc::now(),
        stale: false,
    }
}

/// Folds the events attributed to one provider over a trailing window
pub fn fold_provider(
    provider_id: &ProviderId,
    events: &[JourneyEvent],
    readmitted_discharges: &HashSet<EventId>,
    window_days: u32,
    now: DateTime<Utc>,
) -> ProviderPerformanceSnapshot {
    let window_start = now - Duration::days(i64::from(window_days));
    let in_window: Vec<&JourneyEvent> = events
        .iter()
        .filter(|e| {
            e.provider_id.as_ref() == Some(provider_id) && e.event_datetime >= window_start
        })
        .collect();

    let stats = windowed_stats(&in_window, readmitted_discharges);

    ProviderPerformanceSnapshot {
        provider_id: provider_id.clone(),
        window_days,
        encounter_volume: stats.encounter_volume,
        average_los_hours: stats.average_los_hours,
        readmission_rate: stats.readmission_rate,
        total_cost: stats.total_cost,
        cost_per_encounter: stats.cost_per_encounter(),
        last_updated: Utc::now(),
        stale: false,
    }
}

/// Folds the events at one facility over a trailing window
pub fn fold_facility(
    facility_id: &FacilityId,
    events: &[JourneyEvent],
    readmitted_discharges: &HashSet<EventId>,
    window_days: u32,
    now: DateTime<Utc>,
) -> FacilityUtilizationSnapshot {
    let window_start = now - Duration::days(i64::from(window_days));
    let in_window: Vec<&JourneyEvent> = events
        .iter()
        .filter(|e| {
            e.facility_id.as_ref() == Some(facility_id) && e.event_datetime >= window_start
        })
        .collect();

    let distinct_patients: HashSet<&PatientId> =
        in_window.iter().map(|e| &e.patient_id).collect();
    let stats = windowed_stats(&in_window, readmitted_discharges);

    FacilityUtilizationSnapshot {
        facility_id: facility_id.clone(),
        window_days,
        encounter_volume: stats.encounter_volume,
        distinct_patients: distinct_patients.len() as u64,
        average_los_hours: stats.average_los_hours,
        readmission_rate: stats.readmission_rate,
        total_cost: stats.total_cost,
        last_updated: Utc::now(),
        stale: false,
    }
}

struct WindowedStats {
    encounter_volume: u64,
    average_los_hours: Option<f64>,
    readmission_rate: f64,
    total_cost: f64,
}

impl WindowedStats {
    fn cost_per_encounter(&self) -> Option<f64> {
        if self.encounter_volume == 0 {
            None
        } else {
            Some(self.total_cost / self.encounter_volume as f64)
        }
    }
}

fn windowed_stats(
    in_window: &[&JourneyEvent],
    readmitted_discharges: &HashSet<EventId>,
) -> WindowedStats {
    let mut encounters = HashSet::new();
    let mut unkeyed_events = 0u64;
    let mut total_cost = 0.0;
    let mut los_values = Vec::new();
    let mut discharges = 0usize;
    let mut readmitted = 0usize;

    for event in in_window {
        match &event.encounter_id {
            Some(encounter_id) => {
                encounters.insert(encounter_id.clone());
            }
            None => unkeyed_events += 1,
        }
        if let Some(cost) = event.cost_amount {
            total_cost += cost;
        }
        if event.event_type == EventType::Discharge {
            discharges += 1;
            if let Some(los) = event.length_of_stay_hours {
                los_values.push(los);
            }
            if readmitted_discharges.contains(&event.event_id) {
                readmitted += 1;
            }
        }
    }

    WindowedStats {
        encounter_volume: encounters.len() as u64 + unkeyed_events,
        average_los_hours: mean(&los_values),
        readmission_rate: if discharges == 0 {
            0.0
        } else {
            readmitted as f64 / discharges as f64
        },
        total_cost,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Published snapshots, read-only to everything but the materializer
///
/// Each snapshot is stored behind an `Arc` and replaced wholesale on
/// refresh: a reader holds either the fully pre-refresh or the fully
/// post-refresh value, never a mix.
#[derive(Default)]
pub struct SnapshotStore {
    patients: RwLock<HashMap<PatientId, Arc<PatientMetricsSnapshot>>>,
    providers: RwLock<HashMap<ProviderId, Arc<ProviderPerformanceSnapshot>>>,
    facilities: RwLock<HashMap<FacilityId, Arc<FacilityUtilizationSnapshot>>>,
}

impl SnapshotStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the current patient snapshot, possibly stale
    pub fn patient(&self, patient_id: &PatientId) -> Option<Arc<PatientMetricsSnapshot>> {
        self.patients
            .read()
            .expect("snapshot lock poisoned")
            .get(patient_id)
            .cloned()
    }

    /// Reads the current provider snapshot, possibly stale
    pub fn provider(&self, provider_id: &ProviderId) -> Option<Arc<ProviderPerformanceSnapshot>> {
        self.providers
            .read()
            .expect("snapshot lock poisoned")
            .get(provider_id)
            .cloned()
    }

    /// Reads the current facility snapshot, possibly stale
    pub fn facility(
        &self,
        facility_id: &FacilityId,
    ) -> Option<Arc<FacilityUtilizationSnapshot>> {
        self.facilities
            .read()
            .expect("snapshot lock poisoned")
            .get(facility_id)
            .cloned()
    }

    /// All published patient snapshots, sorted by patient for determinism
    pub fn all_patients(&self) -> Vec<Arc<PatientMetricsSnapshot>> {
        let mut snapshots: Vec<_> = self
            .patients
            .read()
            .expect("snapshot lock poisoned")
            .values()
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| a.patient_id.cmp(&b.patient_id));
        snapshots
    }

    /// All published provider snapshots, sorted for determinism
    pub fn all_providers(&self) -> Vec<Arc<ProviderPerformanceSnapshot>> {
        let mut snapshots: Vec<_> = self
            .providers
            .read()
            .expect("snapshot lock poisoned")
            .values()
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        snapshots
    }

    /// All published facility snapshots, sorted for determinism
    pub fn all_facilities(&self) -> Vec<Arc<FacilityUtilizationSnapshot>> {
        let mut snapshots: Vec<_> = self
            .facilities
            .read()
            .expect("snapshot lock poisoned")
            .values()
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| a.facility_id.cmp(&b.facility_id));
        snapshots
    }

    pub(crate) fn publish_patient(&self, snapshot: PatientMetricsSnapshot) {
        self.patients
            .write()
            .expect("snapshot lock poisoned")
            .insert(snapshot.patient_id.clone(), Arc::new(snapshot));
    }

    pub(crate) fn publish_provider(&self, snapshot: ProviderPerformanceSnapshot) {
        self.providers
            .write()
            .expect("snapshot lock poisoned")
            .insert(snapshot.provider_id.clone(), Arc::new(snapshot));
    }

    pub(crate) fn publish_facility(&self, snapshot: FacilityUtilizationSnapshot) {
        self.facilities
            .write()
            .expect("snapshot lock poisoned")
            .insert(snapshot.facility_id.clone(), Arc::new(snapshot));
    }

    /// Marks the published patient snapshot stale after a failed refresh
    pub(crate) fn mark_patient_stale(&self, patient_id: &PatientId) {
        let mut patients = self.patients.write().expect("snapshot lock poisoned");
        if let Some(existing) = patients.get(patient_id) {
            let mut stale = (**existing).clone();
            stale.stale = true;
            patients.insert(patient_id.clone(), Arc::new(stale));
        }
    }

    /// Marks the published provider snapshot stale after a failed refresh
    pub(crate) fn mark_provider_stale(&self, provider_id: &ProviderId) {
        let mut providers = self.providers.write().expect("snapshot lock poisoned");
        if let Some(existing) = providers.get(provider_id) {
            let mut stale = (**existing).clone();
            stale.stale = true;
            providers.insert(provider_id.clone(), Arc::new(stale));
        }
    }

    /// Marks the published facility snapshot stale after a failed refresh
    pub(crate) fn mark_facility_stale(&self, facility_id: &FacilityId) {
        let mut facilities = self.facilities.write().expect("snapshot lock poisoned");
        if let Some(existing) = facilities.get(facility_id) {
            let mut stale = (**existing).clone();
            stale.stale = true;
            facilities.insert(facility_id.clone(), Arc::new(stale));
        }
    }
}
