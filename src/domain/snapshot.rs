//! Rolling aggregate snapshot models
//!
//! Snapshots are materialized views over sequenced journeys, scoped to one
//! entity (patient, provider, or facility). They are mutated only by the
//! aggregate materializer and are safe to serve stale while a refresh is in
//! flight; `stale` is set when a refresh exhausts its retry budget.

use super::ids::{FacilityId, PatientId, ProviderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-patient rolling metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientMetricsSnapshot {
    /// Patient this snapshot describes
    pub patient_id: PatientId,

    /// Count of distinct encounters in the journey
    pub total_encounters: u64,

    /// Timestamp of the earliest journey event
    pub first_encounter_at: Option<DateTime<Utc>>,

    /// Timestamp of the latest journey event
    pub last_encounter_at: Option<DateTime<Utc>>,

    /// Mean length of stay across completed encounters, in hours
    pub average_los_hours: Option<f64>,

    /// Sum of all cost amounts across the journey
    pub total_cost: f64,

    /// Mean quality score across scored encounters
    pub average_quality_score: Option<f64>,

    /// True when any readmission link falls within the 30-day window
    pub readmission_30_day: bool,

    /// True when any readmission link falls within the 90-day window
    pub readmission_90_day: bool,

    /// Count of distinct chronic-condition diagnosis codes seen
    pub chronic_condition_count: u64,

    /// When this snapshot was last refreshed
    pub last_updated: DateTime<Utc>,

    /// True when the last refresh attempt exhausted its retry budget
    pub stale: bool,
}

impl PatientMetricsSnapshot {
    /// Creates an empty snapshot for a patient with no derived facts yet
    pub fn empty(patient_id: PatientId) -> Self {
        Self {
            patient_id,
            total_encounters: 0,
            first_encounter_at: None,
            last_encounter_at: None,
            average_los_hours: None,
            total_cost: 0.0,
            average_quality_score: None,
            readmission_30_day: false,
            readmission_90_day: false,
            chronic_condition_count: 0,
            last_updated: Utc::now(),
            stale: false,
        }
    }
}

/// Windowed provider performance metrics
///
/// Computed by grouping journey events by provider over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPerformanceSnapshot {
    /// Provider this snapshot describes
    pub provider_id: ProviderId,

    /// Trailing window length in days
    pub window_days: u32,

    /// Count of distinct encounters attributed to the provider in the window
    pub encounter_volume: u64,

    /// Mean length of stay across the provider's completed encounters
    pub average_los_hours: Option<f64>,

    /// Readmission links per discharge within the window
    pub readmission_rate: f64,

    /// Sum of cost amounts across the provider's events in the window
    pub total_cost: f64,

    /// Cost per encounter; the cost-efficiency measure
    pub cost_per_encounter: Option<f64>,

    /// When this snapshot was last refreshed
    pub last_updated: DateTime<Utc>,

    /// True when the last refresh attempt exhausted its retry budget
    pub stale: bool,
}

/// Windowed facility utilization metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityUtilizationSnapshot {
    /// Facility this snapshot describes
    pub facility_id: FacilityId,

    /// Trailing window length in days
    pub window_days: u32,

    /// Count of distinct encounters at the facility in the window
    pub encounter_volume: u64,

    /// Count of distinct patients seen at the facility in the window
    pub distinct_patients: u64,

    /// Mean length of stay across the facility's completed encounters
    pub average_los_hours: Option<f64>,

    /// Readmission links per discharge within the window
    pub readmission_rate: f64,

    /// Sum of cost amounts across the facility's events in the window
    pub total_cost: f64,

    /// When this snapshot was last refreshed
    pub last_updated: DateTime<Utc>,

    /// True when the last refresh attempt exhausted its retry budget
    pub stale: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_patient_snapshot() {
        let snapshot = PatientMetricsSnapshot::empty(PatientId::new("PAT000001").unwrap());
        assert_eq!(snapshot.total_encounters, 0);
        assert!(snapshot.average_los_hours.is_none());
        assert!(!snapshot.stale);
        assert!(!snapshot.readmission_30_day);
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = PatientMetricsSnapshot::empty(PatientId::new("PAT000001").unwrap());
        let json = serde_json::to_string(&snapshot).unwrap();
        let deserialized: PatientMetricsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, deserialized);
    }
}
