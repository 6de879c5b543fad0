//! Readmission link scanning
//!
//! Walks a sequenced journey and links each Discharge to the nearest
//! chronologically-following Admission for the same patient. Intervening
//! non-admission events (labs, imaging, medications) between the discharge
//! and that admission do not break the link; an admission further in the
//! future never creates a second link to the same discharge.

use crate::config::PipelineConfig;
use crate::domain::event::{EventType, JourneyEvent};
use crate::domain::ids::PatientId;
use crate::domain::readmission::ReadmissionLink;

/// Rebuilds the full readmission link set for one journey
///
/// The scan is deterministic over the event order, so recomputing on an
/// unchanged journey yields an identical link set and never duplicates.
pub fn scan_links(
    patient_id: &PatientId,
    events: &[JourneyEvent],
    config: &PipelineConfig,
) -> Vec<ReadmissionLink> {
    let windows = config.window_pair();
    let mut links = Vec::new();

    for (index, discharge) in events.iter().enumerate() {
        if discharge.event_type != EventType::Discharge {
            continue;
        }

        let next_admission = events[index + 1..]
            .iter()
            .find(|e| e.event_type == EventType::Admission);

        if let Some(admission) = next_admission {
            links.push(ReadmissionLink::new(
                patient_id.clone(),
                discharge.event_id.clone(),
                admission.event_id.clone(),
                discharge.event_datetime,
                admission.event_datetime,
                windows,
            ));
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::JourneyEventBuilder;
    use crate::domain::ids::EventId;
    use chrono::{TimeZone, Utc};

    fn event(id: &str, event_type: EventType, hour_offset: i64) -> JourneyEvent {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        JourneyEventBuilder::new()
            .event_id(EventId::new(id).unwrap())
            .patient_id(PatientId::new("PAT000001").unwrap())
            .event_type(event_type)
            .event_datetime(base + chrono::Duration::hours(hour_offset))
            .source_system("test_feed")
            .build()
            .unwrap()
    }

    fn patient() -> PatientId {
        PatientId::new("PAT000001").unwrap()
    }

    #[test]
    fn test_link_spans_intervening_events() {
        let events = vec![
            event("ADM1", EventType::Admission, 0),
            event("DIS1", EventType::Discharge, 50),
            event("LAB1", EventType::LabResult, 60),
            event("MED1", EventType::MedicationOrder, 70),
            event("ADM2", EventType::Admission, 480),
        ];
        let links = scan_links(&patient(), &events, &PipelineConfig::default());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].discharge_event_id.as_str(), "DIS1");
        assert_eq!(links[0].admission_event_id.as_str(), "ADM2");
    }

    #[test]
    fn test_only_nearest_admission_links() {
        let events = vec![
            event("DIS1", EventType::Discharge, 0),
            event("ADM1", EventType::Admission, 100),
            event("ADM2", EventType::Admission, 300),
        ];
        let links = scan_links(&patient(), &events, &PipelineConfig::default());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].admission_event_id.as_str(), "ADM1");
    }

    #[test]
    fn test_no_link_without_following_admission() {
        let events = vec![
            event("ADM1", EventType::Admission, 0),
            event("DIS1", EventType::Discharge, 50),
            event("LAB1", EventType::LabResult, 60),
        ];
        let links = scan_links(&patient(), &events, &PipelineConfig::default());
        assert!(links.is_empty());
    }

    #[test]
    fn test_rescan_is_identical() {
        let events = vec![
            event("DIS1", EventType::Discharge, 0),
            event("ADM1", EventType::Admission, 240),
        ];
        let config = PipelineConfig::default();
        let first = scan_links(&patient(), &events, &config);
        let second = scan_links(&patient(), &events, &config);
        assert_eq!(first, second);
    }
}
