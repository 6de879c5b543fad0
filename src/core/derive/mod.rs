//! Metric derivation engine
//!
//! Operates on a fully sequenced journey: pairs admissions with discharges
//! to compute length of stay, rebuilds readmission links, estimates missing
//! cost amounts, and scores completed encounters.
//!
//! Recomputation is positional: a change at sequence position `p`
//! invalidates derived fields for events at or after `p` only. The two
//! cross-event exceptions are deliberate corrections of earlier
//! conclusions: an admission whose stay is completed by a discharge at or
//! after `p` gets its length of stay refreshed, and a discharge whose
//! readmission target sits at or after `p` gets its score refreshed.

pub mod quality;
pub mod readmission;

use crate::config::PipelineConfig;
use crate::core::sequence::PatientJourney;
use crate::domain::event::{EventType, JourneyEvent};
use crate::domain::ids::{EncounterId, EventId};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Base cost by visit kind, used when the source supplies no cost amount
///
/// Inpatient stays scale with length of stay; point-in-time visits carry the
/// flat base.
const INPATIENT_BASE_COST: f64 = 5000.0;
const EMERGENCY_BASE_COST: f64 = 1500.0;
const OUTPATIENT_BASE_COST: f64 = 300.0;

/// Result of one derivation pass over a journey
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationOutcome {
    /// Number of events whose derived fields were recomputed
    pub recomputed: usize,

    /// True when the journey's readmission link set changed
    pub links_changed: bool,
}

#[derive(Default)]
struct EncounterPair {
    admission: Option<usize>,
    discharge: Option<usize>,
}

/// Computes derived fields and readmission links over sequenced journeys
#[derive(Debug, Clone)]
pub struct DerivationEngine {
    config: PipelineConfig,
}

impl DerivationEngine {
    /// Creates an engine with the given derivation settings
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Recomputes derived state for events at or after `from_position`
    ///
    /// Idempotent: recomputation on an unchanged journey yields identical
    /// derived values and an identical link set.
    pub fn recompute(
        &self,
        journey: &mut PatientJourney,
        from_position: usize,
    ) -> DerivationOutcome {
        let links = readmission::scan_links(journey.patient_id(), journey.events(), &self.config);

        let events = journey.events();
        let pairs = encounter_pairs(events);
        let index_by_id: HashMap<EventId, usize> = events
            .iter()
            .enumerate()
            .map(|(i, e)| (e.event_id.clone(), i))
            .collect();

        // Events at or after the change point are always recomputed; pair and
        // link partners of those events are pulled in as corrections.
        let mut dirty: BTreeSet<usize> = (from_position..events.len()).collect();
        for pair in pairs.values() {
            if let (Some(admission), Some(discharge)) = (pair.admission, pair.discharge) {
                if dirty.contains(&admission) || dirty.contains(&discharge) {
                    dirty.insert(admission);
                    dirty.insert(discharge);
                }
            }
        }
        let readmitted: HashSet<EventId> = links
            .iter()
            .map(|l| l.discharge_event_id.clone())
            .collect();
        for link in &links {
            if let (Some(&admission), Some(&discharge)) = (
                index_by_id.get(&link.admission_event_id),
                index_by_id.get(&link.discharge_event_id),
            ) {
                if dirty.contains(&admission) {
                    dirty.insert(discharge);
                }
            }
        }

        let los_by_index = stay_lengths(events, &pairs);

        // Stage every update against the immutable view, then apply.
        let mut updates: Vec<(usize, Option<f64>, Option<f64>, Option<f64>)> = Vec::new();
        for &index in &dirty {
            let event = &events[index];
            let los = los_by_index.get(&index).copied();
            let cost = self.cost_for(event, los);
            let score = if event.event_type == EventType::Discharge {
                Some(quality::quality_score(
                    &self.config,
                    los,
                    readmitted.contains(&event.event_id),
                    complication_count(events, &pairs, index),
                ))
            } else {
                None
            };
            updates.push((index, los, cost, score));
        }

        let recomputed = dirty.len();
        let events = journey.events_mut();
        for (index, los, cost, score) in updates {
            let event = &mut events[index];
            event.clear_derived();
            event.length_of_stay_hours = los;
            if event.cost_amount.is_none() {
                event.cost_amount = cost;
            }
            event.quality_score = score;
        }

        let links_changed = journey.set_links(links);

        DerivationOutcome {
            recomputed,
            links_changed,
        }
    }

    /// Estimates a cost amount when the source supplied none
    fn cost_for(&self, event: &JourneyEvent, los_hours: Option<f64>) -> Option<f64> {
        if event.cost_from_source {
            return event.cost_amount;
        }
        match event.event_type {
            EventType::Discharge => los_hours
                .map(|los| INPATIENT_BASE_COST * (1.0 + los / 24.0 * 0.5)),
            EventType::EmergencyVisit => Some(EMERGENCY_BASE_COST),
            EventType::OutpatientVisit => Some(OUTPATIENT_BASE_COST),
            _ => None,
        }
    }
}

/// Maps each encounter to the first admission and first discharge seen in
/// journey order
fn encounter_pairs(events: &[JourneyEvent]) -> HashMap<EncounterId, EncounterPair> {
    let mut pairs: HashMap<EncounterId, EncounterPair> = HashMap::new();
    for (index, event) in events.iter().enumerate() {
        let Some(encounter_id) = &event.encounter_id else {
            continue;
        };
        let pair = pairs.entry(encounter_id.clone()).or_default();
        match event.event_type {
            EventType::Admission => {
                pair.admission.get_or_insert(index);
            }
            EventType::Discharge => {
                pair.discharge.get_or_insert(index);
            }
            _ => {}
        }
    }
    pairs
}

/// Length of stay for both ends of every completed pair, keyed by event index
///
/// Undefined until both ends exist; a discharge timestamped before its
/// admission yields no length of stay rather than a negative one.
fn stay_lengths(
    events: &[JourneyEvent],
    pairs: &HashMap<EncounterId, EncounterPair>,
) -> HashMap<usize, f64> {
    let mut los_by_index = HashMap::new();
    for pair in pairs.values() {
        let (Some(admission), Some(discharge)) = (pair.admission, pair.discharge) else {
            continue;
        };
        let delta = events[discharge].event_datetime - events[admission].event_datetime;
        let hours = delta.num_minutes() as f64 / 60.0;
        if hours >= 0.0 {
            los_by_index.insert(admission, hours);
            los_by_index.insert(discharge, hours);
        }
    }
    los_by_index
}

/// Distinct complications recorded across both ends of the encounter
fn complication_count(
    events: &[JourneyEvent],
    pairs: &HashMap<EncounterId, EncounterPair>,
    discharge_index: usize,
) -> usize {
    let mut distinct: BTreeSet<&str> = events[discharge_index]
        .complications
        .iter()
        .map(String::as_str)
        .collect();
    if let Some(encounter_id) = &events[discharge_index].encounter_id {
        if let Some(pair) = pairs.get(encounter_id) {
            if let Some(admission) = pair.admission {
                distinct.extend(events[admission].complications.iter().map(String::as_str));
            }
        }
    }
    distinct.len()
}
