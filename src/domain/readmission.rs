//! Readmission link model
//!
//! A derived relationship between a discharge and the nearest
//! chronologically-following admission for the same patient. Links are
//! recomputed whenever the underlying journey changes; they are never
//! authoritative state.

use super::ids::{EventId, PatientId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discharge followed by a readmission for the same patient
///
/// At most one link exists per discharge: the nearest following admission in
/// journey order. Intervening labs, imaging, or medication events between the
/// discharge and that admission do not break the link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadmissionLink {
    /// Patient both events belong to
    pub patient_id: PatientId,

    /// The discharge end of the link
    pub discharge_event_id: EventId,

    /// The subsequent admission
    pub admission_event_id: EventId,

    /// Discharge timestamp
    pub discharge_datetime: DateTime<Utc>,

    /// Admission timestamp
    pub admission_datetime: DateTime<Utc>,

    /// Whole days between discharge and readmission, always >= 0
    pub days_between: i64,

    /// True when the gap falls within the configured 30-day window
    pub is_30_day: bool,

    /// True when the gap falls within the configured 90-day window
    pub is_90_day: bool,
}

impl ReadmissionLink {
    /// Builds a link between a discharge and a following admission
    ///
    /// `windows` are the configured day-count thresholds, conventionally
    /// `[30, 90]`; the first classifies `is_30_day`, the second `is_90_day`.
    pub fn new(
        patient_id: PatientId,
        discharge_event_id: EventId,
        admission_event_id: EventId,
        discharge_datetime: DateTime<Utc>,
        admission_datetime: DateTime<Utc>,
        windows: (u32, u32),
    ) -> Self {
        let days_between = (admission_datetime - discharge_datetime).num_days().max(0);
        Self {
            patient_id,
            discharge_event_id,
            admission_event_id,
            discharge_datetime,
            admission_datetime,
            days_between,
            is_30_day: days_between <= i64::from(windows.0),
            is_90_day: days_between <= i64::from(windows.1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_link_window_classification() {
        let discharge = Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap();
        let admission = discharge + chrono::Duration::days(20);
        let link = ReadmissionLink::new(
            PatientId::new("PAT000001").unwrap(),
            EventId::new("EVT-D").unwrap(),
            EventId::new("EVT-A").unwrap(),
            discharge,
            admission,
            (30, 90),
        );
        assert_eq!(link.days_between, 20);
        assert!(link.is_30_day);
        assert!(link.is_90_day);
    }

    #[test]
    fn test_link_outside_30_inside_90() {
        let discharge = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let admission = discharge + chrono::Duration::days(45);
        let link = ReadmissionLink::new(
            PatientId::new("PAT000001").unwrap(),
            EventId::new("EVT-D").unwrap(),
            EventId::new("EVT-A").unwrap(),
            discharge,
            admission,
            (30, 90),
        );
        assert!(!link.is_30_day);
        assert!(link.is_90_day);
    }

    #[test]
    fn test_days_between_never_negative() {
        // Same-day discharge and readmission, admission clock slightly behind
        let discharge = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let admission = Utc.with_ymd_and_hms(2025, 1, 1, 11, 30, 0).unwrap();
        let link = ReadmissionLink::new(
            PatientId::new("PAT000001").unwrap(),
            EventId::new("EVT-D").unwrap(),
            EventId::new("EVT-A").unwrap(),
            discharge,
            admission,
            (30, 90),
        );
        assert_eq!(link.days_between, 0);
    }
}
