//! Journey event domain model
//!
//! This module defines the canonical clinical event shape produced by the
//! normalizer, the raw ingestion-boundary record it is built from, and the
//! data-quality flags attached along the way.

use super::ids::{EncounterId, EventId, FacilityId, PatientId, ProviderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw event record as received at the ingestion boundary
///
/// The payload is an opaque key-value document from one of the source
/// systems; only the normalizer interprets it. The source-system tag and the
/// receipt timestamp are attached by the connector that delivered the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Declared source-system tag (e.g. "epic_adt", "lab_feed")
    pub source_system: String,

    /// Opaque payload as delivered by the source system
    pub payload: serde_json::Value,

    /// Timestamp at which the record was received for ingestion
    pub received_at: DateTime<Utc>,
}

impl RawEvent {
    /// Creates a new raw event with the current receipt time
    pub fn new(source_system: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            source_system: source_system.into(),
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Canonical clinical event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Inpatient admission
    Admission,
    /// Inpatient discharge
    Discharge,
    /// Laboratory result
    LabResult,
    /// Imaging study
    ImagingStudy,
    /// Medication order
    MedicationOrder,
    /// Clinical assessment
    Assessment,
    /// Outpatient or ambulatory visit
    OutpatientVisit,
    /// Emergency department visit
    EmergencyVisit,
}

impl EventType {
    /// Returns true for event types that open or close an inpatient stay
    pub fn is_encounter_boundary(self) -> bool {
        matches!(self, Self::Admission | Self::Discharge)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Admission => "admission",
            Self::Discharge => "discharge",
            Self::LabResult => "lab_result",
            Self::ImagingStudy => "imaging_study",
            Self::MedicationOrder => "medication_order",
            Self::Assessment => "assessment",
            Self::OutpatientVisit => "outpatient_visit",
            Self::EmergencyVisit => "emergency_visit",
        };
        write!(f, "{name}")
    }
}

/// Data-quality warning attached during normalization
///
/// Flags are advisory: they never block ingestion. A record missing its
/// patient identifier or timestamp is instead rejected outright (see
/// [`crate::domain::errors::NormalizeError`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum DataQualityFlag {
    /// No encounter identifier on the record
    MissingEncounterId,
    /// No facility identifier on the record
    MissingFacility,
    /// No provider identifier on the record
    MissingProvider,
    /// No recognizable event type; a fallback type was assigned
    MissingEventType,
    /// Event type string not recognized; carried value included
    UnknownEventType(String),
    /// Diagnosis code failed format validation
    InvalidDiagnosisCode(String),
    /// Procedure code failed format validation
    InvalidProcedureCode(String),
    /// Source reported a negative cost amount; value discarded
    NegativeCost,
}

/// A canonical clinical touchpoint in a patient's journey
///
/// Created by the normalizer, positioned by the sequencer, and enriched by
/// the derivation engine. Once all three stages have run the event is
/// immutable unless a corrected source record with the same `event_id`
/// arrives, in which case this version is retained (marked superseded) and a
/// new version takes its place in the journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyEvent {
    /// Stable event identity across versions
    pub event_id: EventId,

    /// Patient this event belongs to
    pub patient_id: PatientId,

    /// Encounter grouping, if the source supplied one
    pub encounter_id: Option<EncounterId>,

    /// Canonical event type
    pub event_type: EventType,

    /// Clinical timestamp of the event
    pub event_datetime: DateTime<Utc>,

    /// Facility where the event occurred
    pub facility_id: Option<FacilityId>,

    /// Provider responsible for the event
    pub provider_id: Option<ProviderId>,

    /// Primary diagnosis code (ICD-10 format)
    pub diagnosis_code: Option<String>,

    /// Procedure codes (CPT format)
    pub procedure_codes: Vec<String>,

    /// Complications recorded on the encounter
    pub complications: Vec<String>,

    /// Originating source-system tag
    pub source_system: String,

    /// Per-patient arrival ordinal; deterministic tie-break for equal
    /// event timestamps
    pub ingestion_order: u64,

    /// Dense per-patient ordinal assigned by the sequencer; None until
    /// sequenced
    pub sequence_number: Option<u64>,

    /// Length of stay in hours; None until the encounter's admission and
    /// discharge both exist
    pub length_of_stay_hours: Option<f64>,

    /// Cost amount; carried from the source or estimated by the derivation
    /// engine
    pub cost_amount: Option<f64>,

    /// Quality score in [0.0, 10.0]; computed on discharge events
    pub quality_score: Option<f64>,

    /// Data-quality warnings attached during normalization
    pub data_quality_flags: Vec<DataQualityFlag>,

    /// Version of this event record, starting at 1
    pub version: u32,

    /// True once a corrected record has replaced this version
    pub superseded: bool,

    /// True when the cost amount came from the source payload rather than
    /// the derivation engine's estimate
    #[serde(default)]
    pub cost_from_source: bool,
}

impl JourneyEvent {
    /// Creates a new builder for constructing a JourneyEvent
    pub fn builder() -> JourneyEventBuilder {
        JourneyEventBuilder::default()
    }

    /// Clears all derived fields, returning the event to its pre-derivation
    /// state
    ///
    /// A source-provided cost is an input, not a derivation, and survives.
    pub fn clear_derived(&mut self) {
        self.length_of_stay_hours = None;
        if !self.cost_from_source {
            self.cost_amount = None;
        }
        self.quality_score = None;
    }

    /// True once the sequencer has positioned this event
    pub fn is_sequenced(&self) -> bool {
        self.sequence_number.is_some()
    }
}

/// Builder for constructing JourneyEvent instances
///
/// Only the normalizer constructs events; required fields mirror the
/// normalizer's hard input constraints (patient id and timestamp).
#[derive(Debug, Default)]
pub struct JourneyEventBuilder {
    event_id: Option<EventId>,
    patient_id: Option<PatientId>,
    encounter_id: Option<EncounterId>,
    event_type: Option<EventType>,
    event_datetime: Option<DateTime<Utc>>,
    facility_id: Option<FacilityId>,
    provider_id: Option<ProviderId>,
    diagnosis_code: Option<String>,
    procedure_codes: Vec<String>,
    complications: Vec<String>,
    source_system: Option<String>,
    cost_amount: Option<f64>,
    data_quality_flags: Vec<DataQualityFlag>,
}

impl JourneyEventBuilder {
    /// Creates a new JourneyEventBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event ID
    pub fn event_id(mut self, event_id: EventId) -> Self {
        self.event_id = Some(event_id);
        self
    }

    /// Sets the patient ID
    pub fn patient_id(mut self, patient_id: PatientId) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    /// Sets the encounter ID
    pub fn encounter_id(mut self, encounter_id: EncounterId) -> Self {
        self.encounter_id = Some(encounter_id);
        self
    }

    /// Sets the event type
    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    /// Sets the event timestamp
    pub fn event_datetime(mut self, event_datetime: DateTime<Utc>) -> Self {
        self.event_datetime = Some(event_datetime);
        self
    }

    /// Sets the facility ID
    pub fn facility_id(mut self, facility_id: FacilityId) -> Self {
        self.facility_id = Some(facility_id);
        self
    }

    /// Sets the provider ID
    pub fn provider_id(mut self, provider_id: ProviderId) -> Self {
        self.provider_id = Some(provider_id);
        self
    }

    /// Sets the primary diagnosis code
    pub fn diagnosis_code(mut self, code: impl Into<String>) -> Self {
        self.diagnosis_code = Some(code.into());
        self
    }

    /// Sets the procedure codes
    pub fn procedure_codes(mut self, codes: Vec<String>) -> Self {
        self.procedure_codes = codes;
        self
    }

    /// Sets the recorded complications
    pub fn complications(mut self, complications: Vec<String>) -> Self {
        self.complications = complications;
        self
    }

    /// Sets the source-system tag
    pub fn source_system(mut self, source_system: impl Into<String>) -> Self {
        self.source_system = Some(source_system.into());
        self
    }

    /// Sets a source-provided cost amount
    pub fn cost_amount(mut self, cost: f64) -> Self {
        self.cost_amount = Some(cost);
        self
    }

    /// Attaches a data-quality flag
    pub fn flag(mut self, flag: DataQualityFlag) -> Self {
        self.data_quality_flags.push(flag);
        self
    }

    /// Builds the JourneyEvent
    ///
    /// # Errors
    ///
    /// Returns an error if any required field is missing.
    pub fn build(self) -> Result<JourneyEvent, String> {
        let cost_amount = self.cost_amount;
        Ok(JourneyEvent {
            event_id: self.event_id.ok_or("event_id is required")?,
            patient_id: self.patient_id.ok_or("patient_id is required")?,
            encounter_id: self.encounter_id,
            event_type: self.event_type.ok_or("event_type is required")?,
            event_datetime: self.event_datetime.ok_or("event_datetime is required")?,
            facility_id: self.facility_id,
            provider_id: self.provider_id,
            diagnosis_code: self.diagnosis_code,
            procedure_codes: self.procedure_codes,
            complications: self.complications,
            source_system: self.source_system.ok_or("source_system is required")?,
            ingestion_order: 0,
            sequence_number: None,
            length_of_stay_hours: None,
            cost_amount,
            quality_score: None,
            data_quality_flags: self.data_quality_flags,
            version: 1,
            superseded: false,
            cost_from_source: cost_amount.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> JourneyEvent {
        JourneyEventBuilder::new()
            .event_id(EventId::new("EVT001").unwrap())
            .patient_id(PatientId::new("PAT000001").unwrap())
            .encounter_id(EncounterId::new("ENC00000001").unwrap())
            .event_type(EventType::Admission)
            .event_datetime(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap())
            .source_system("epic_adt")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_produces_unsequenced_event() {
        let event = sample_event();
        assert_eq!(event.version, 1);
        assert!(!event.superseded);
        assert!(event.sequence_number.is_none());
        assert!(event.length_of_stay_hours.is_none());
        assert!(!event.is_sequenced());
    }

    #[test]
    fn test_builder_missing_field() {
        let result = JourneyEventBuilder::new()
            .patient_id(PatientId::new("PAT000001").unwrap())
            .build();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("event_id is required"));
    }

    #[test]
    fn test_clear_derived_keeps_source_cost() {
        let mut event = JourneyEventBuilder::new()
            .event_id(EventId::new("EVT001").unwrap())
            .patient_id(PatientId::new("PAT000001").unwrap())
            .event_type(EventType::Discharge)
            .event_datetime(Utc::now())
            .source_system("epic_adt")
            .cost_amount(1234.5)
            .build()
            .unwrap();
        event.length_of_stay_hours = Some(48.0);
        event.quality_score = Some(9.0);

        event.clear_derived();

        assert!(event.length_of_stay_hours.is_none());
        assert!(event.quality_score.is_none());
        assert_eq!(event.cost_amount, Some(1234.5));
    }

    #[test]
    fn test_clear_derived_drops_estimated_cost() {
        let mut event = sample_event();
        event.cost_amount = Some(5000.0); // estimated downstream
        event.clear_derived();
        assert!(event.cost_amount.is_none());
    }

    #[test]
    fn test_event_serialization_round_trip() {
        let event = sample_event();
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: JourneyEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.event_id, deserialized.event_id);
        assert_eq!(event.event_type, deserialized.event_type);
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::Admission.to_string(), "admission");
        assert_eq!(EventType::LabResult.to_string(), "lab_result");
        assert!(EventType::Admission.is_encounter_boundary());
        assert!(!EventType::LabResult.is_encounter_boundary());
    }
}
