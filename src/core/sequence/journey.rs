//! Per-patient ordered event arena
//!
//! Each patient's journey is an explicit ordered log segment indexed by
//! sequence number. Events are kept sorted by `(event_datetime,
//! ingestion_order)` and the sequence number of the event at index `i` is
//! always `i + 1`: dense, strictly increasing, starting at 1.
//!
//! Inserting a late-arriving event renumbers only the events at or after the
//! insertion point; everything before keeps its published sequence number.
//! Renumbering is all-or-nothing: invariants are checked before any
//! mutation, so a detected conflict leaves the arena untouched.

use crate::domain::errors::SequencingError;
use crate::domain::event::JourneyEvent;
use crate::domain::ids::{EventId, PatientId};
use crate::domain::readmission::ReadmissionLink;
use chrono::{DateTime, Utc};

/// Result of inserting one event into a journey
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Index at which derived-state recomputation must begin
    pub position: usize,

    /// Number of trailing events whose sequence numbers were rewritten
    pub renumbered: usize,

    /// Version of the event record this insert superseded, if any
    pub superseded_version: Option<u32>,
}

/// One patient's sequenced journey
#[derive(Debug)]
pub struct PatientJourney {
    patient_id: PatientId,
    /// Live events, sorted by (event_datetime, ingestion_order);
    /// `events[i].sequence_number == Some(i as u64 + 1)`
    events: Vec<JourneyEvent>,
    /// Old versions of corrected events, retained for audit
    superseded: Vec<JourneyEvent>,
    /// Readmission links derived from the current event order
    links: Vec<ReadmissionLink>,
    next_ingestion_order: u64,
}

impl PatientJourney {
    /// Creates an empty journey for a patient
    pub fn new(patient_id: PatientId) -> Self {
        Self {
            patient_id,
            events: Vec::new(),
            superseded: Vec::new(),
            links: Vec::new(),
            next_ingestion_order: 1,
        }
    }

    /// The patient this journey belongs to
    pub fn patient_id(&self) -> &PatientId {
        &self.patient_id
    }

    /// The live events in sequence order
    pub fn events(&self) -> &[JourneyEvent] {
        &self.events
    }

    /// Mutable access for the derivation engine; ordering fields must not be
    /// touched through this
    pub(crate) fn events_mut(&mut self) -> &mut [JourneyEvent] {
        &mut self.events
    }

    /// Superseded event versions, oldest first
    pub fn superseded_events(&self) -> &[JourneyEvent] {
        &self.superseded
    }

    /// Current readmission links for this journey
    pub fn links(&self) -> &[ReadmissionLink] {
        &self.links
    }

    /// Replaces the derived readmission links, returning true when changed
    pub(crate) fn set_links(&mut self, links: Vec<ReadmissionLink>) -> bool {
        if self.links == links {
            return false;
        }
        self.links = links;
        true
    }

    /// Number of live events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when the journey holds no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Looks up a live event by its ID
    pub fn event_by_id(&self, event_id: &EventId) -> Option<&JourneyEvent> {
        self.events.iter().find(|e| &e.event_id == event_id)
    }

    /// Inserts an event at its chronological position, renumbering only the
    /// events at or after the insertion point
    ///
    /// Ties on `event_datetime` are broken by ingestion arrival order: the
    /// newly arrived event sorts after existing events with the same
    /// timestamp, deterministically and reproducibly.
    ///
    /// An event whose `event_id` is already present supersedes the existing
    /// version: the old record is retained (marked superseded) and the
    /// replacement is positioned afresh. The returned recompute position is
    /// then the earlier of the old and new positions.
    ///
    /// # Errors
    ///
    /// Returns [`SequencingError::Conflict`] if the arena's invariants are
    /// already violated; no mutation is performed in that case, and the
    /// caller recovers with [`Self::resequence`].
    pub fn insert(&mut self, mut event: JourneyEvent) -> Result<InsertOutcome, SequencingError> {
        // All-or-nothing: never mutate an arena that is already corrupt.
        self.verify_invariants()?;

        let superseded_position = self
            .events
            .iter()
            .position(|e| e.event_id == event.event_id);

        let (prior_version, removed_position) = match superseded_position {
            Some(index) => {
                let mut old = self.events.remove(index);
                event.version = old.version + 1;
                old.superseded = true;
                let version = old.version;
                self.superseded.push(old);
                (Some(version), Some(index))
            }
            None => (None, None),
        };

        event.ingestion_order = self.next_ingestion_order;
        self.next_ingestion_order += 1;

        let sort_key = (event.event_datetime, event.ingestion_order);
        let insert_position = self
            .events
            .partition_point(|e| (e.event_datetime, e.ingestion_order) <= sort_key);

        self.events.insert(insert_position, event);

        let position = match removed_position {
            Some(removed) => removed.min(insert_position),
            None => insert_position,
        };
        self.renumber_from(position);

        debug_assert!(self.verify_invariants().is_ok());

        Ok(InsertOutcome {
            position,
            renumbered: self.events.len() - position,
            superseded_version: prior_version,
        })
    }

    /// Rewrites sequence numbers for events at or after `position`
    fn renumber_from(&mut self, position: usize) {
        for (index, event) in self.events.iter_mut().enumerate().skip(position) {
            event.sequence_number = Some(index as u64 + 1);
        }
    }

    /// Checks the arena invariants: dense sequence numbers starting at 1 and
    /// strictly increasing sort keys
    ///
    /// # Errors
    ///
    /// Returns [`SequencingError::Conflict`] describing the first violation.
    pub fn verify_invariants(&self) -> Result<(), SequencingError> {
        let mut previous: Option<(DateTime<Utc>, u64)> = None;
        for (index, event) in self.events.iter().enumerate() {
            let expected = index as u64 + 1;
            if event.sequence_number != Some(expected) {
                return Err(SequencingError::Conflict {
                    patient_id: self.patient_id.clone(),
                    detail: format!(
                        "event {} holds sequence {:?}, expected {}",
                        event.event_id, event.sequence_number, expected
                    ),
                });
            }
            let key = (event.event_datetime, event.ingestion_order);
            if let Some(previous) = previous {
                if key <= previous {
                    return Err(SequencingError::Conflict {
                        patient_id: self.patient_id.clone(),
                        detail: format!(
                            "ordering violated at sequence {}: {:?} !> {:?}",
                            expected, key, previous
                        ),
                    });
                }
            }
            previous = Some(key);
        }
        Ok(())
    }

    /// Rebuilds the entire sequence from scratch
    ///
    /// The recovery path for a detected [`SequencingError::Conflict`]: a
    /// stable sort by `(event_datetime, ingestion_order)` followed by a full
    /// renumber. Affects this patient only.
    pub fn resequence(&mut self) {
        self.events
            .sort_by_key(|e| (e.event_datetime, e.ingestion_order));
        self.renumber_from(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{EventType, JourneyEventBuilder};
    use chrono::TimeZone;

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

    fn journey() -> PatientJourney {
        PatientJourney::new(PatientId::new("PAT000001").unwrap())
    }

    fn sequence_numbers(journey: &PatientJourney) -> Vec<u64> {
        journey
            .events()
            .iter()
            .map(|e| e.sequence_number.unwrap())
            .collect()
    }

    #[test]
    fn test_in_order_inserts_are_appended() {
        let mut journey = journey();
        for (i, id) in ["A", "B", "C"].iter().enumerate() {
            let outcome = journey
                .insert(event(id, EventType::Assessment, i as i64))
                .unwrap();
            assert_eq!(outcome.position, i);
            assert_eq!(outcome.renumbered, 1);
        }
        assert_eq!(sequence_numbers(&journey), vec![1, 2, 3]);
    }

    #[test]
    fn test_late_event_renumbers_only_trailing() {
        let mut journey = journey();
        journey.insert(event("A", EventType::Admission, 0)).unwrap();
        journey.insert(event("C", EventType::Discharge, 50)).unwrap();
        journey.insert(event("D", EventType::Admission, 480)).unwrap();

        // A lab result arriving late, timestamped between A and C
        let outcome = journey.insert(event("B", EventType::LabResult, 1)).unwrap();
        assert_eq!(outcome.position, 1);
        assert_eq!(outcome.renumbered, 3);

        let ids: Vec<&str> = journey.events().iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "D"]);
        assert_eq!(sequence_numbers(&journey), vec![1, 2, 3, 4]);
        // The event before the insertion point kept its number
        assert_eq!(journey.events()[0].sequence_number, Some(1));
    }

    #[test]
    fn test_equal_timestamps_break_ties_by_arrival() {
        let mut journey = journey();
        journey.insert(event("FIRST", EventType::LabResult, 2)).unwrap();
        journey.insert(event("SECOND", EventType::LabResult, 2)).unwrap();
        journey.insert(event("THIRD", EventType::LabResult, 2)).unwrap();

        let ids: Vec<&str> = journey.events().iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["FIRST", "SECOND", "THIRD"]);
        assert_eq!(sequence_numbers(&journey), vec![1, 2, 3]);
    }

    #[test]
    fn test_sequence_dense_after_shuffled_arrival() {
        let mut journey = journey();
        for offset in [9, 3, 7, 1, 5, 0, 8, 2, 6, 4] {
            journey
                .insert(event(&format!("E{offset}"), EventType::Assessment, offset))
                .unwrap();
        }
        assert_eq!(sequence_numbers(&journey), (1..=10).collect::<Vec<u64>>());
        let times: Vec<_> = journey.events().iter().map(|e| e.event_datetime).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        journey.verify_invariants().unwrap();
    }

    #[test]
    fn test_supersede_retains_old_version() {
        let mut journey = journey();
        journey.insert(event("A", EventType::Admission, 0)).unwrap();
        journey.insert(event("B", EventType::Discharge, 50)).unwrap();

        // Corrected admission arrives with an adjusted timestamp
        let outcome = journey.insert(event("A", EventType::Admission, 2)).unwrap();
        assert_eq!(outcome.superseded_version, Some(1));
        assert_eq!(outcome.position, 0);

        assert_eq!(journey.len(), 2);
        assert_eq!(journey.superseded_events().len(), 1);
        assert!(journey.superseded_events()[0].superseded);
        assert_eq!(journey.event_by_id(&EventId::new("A").unwrap()).unwrap().version, 2);
        assert_eq!(sequence_numbers(&journey), vec![1, 2]);
    }

    #[test]
    fn test_conflict_detected_and_arena_untouched() {
        let mut journey = journey();
        journey.insert(event("A", EventType::Admission, 0)).unwrap();
        journey.insert(event("B", EventType::Discharge, 50)).unwrap();

        // Corrupt a sequence slot behind the arena's back
        journey.events_mut()[1].sequence_number = Some(1);
        let snapshot: Vec<u64> = journey
            .events()
            .iter()
            .map(|e| e.sequence_number.unwrap())
            .collect();

        let err = journey.insert(event("C", EventType::Admission, 60)).unwrap_err();
        assert!(matches!(err, SequencingError::Conflict { .. }));
        // No partial renumbering was applied
        assert_eq!(journey.len(), 2);
        let after: Vec<u64> = journey
            .events()
            .iter()
            .map(|e| e.sequence_number.unwrap())
            .collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_resequence_recovers_from_conflict() {
        let mut journey = journey();
        journey.insert(event("A", EventType::Admission, 0)).unwrap();
        journey.insert(event("B", EventType::Discharge, 50)).unwrap();
        journey.events_mut()[1].sequence_number = Some(7);

        assert!(journey.verify_invariants().is_err());
        journey.resequence();
        journey.verify_invariants().unwrap();
        assert_eq!(sequence_numbers(&journey), vec![1, 2]);

        // Inserts succeed again after recovery
        journey.insert(event("C", EventType::Admission, 60)).unwrap();
        assert_eq!(sequence_numbers(&journey), vec![1, 2, 3]);
    }
}
