//! Event normalizer
//!
//! Maps raw heterogeneous event payloads into the canonical
//! [`JourneyEvent`] shape. Normalization is deliberately forgiving: the only
//! hard requirements are a patient identifier and a parseable timestamp,
//! because an event without them can never be sequenced. Every other gap is
//! recorded as a [`DataQualityFlag`] and ingestion proceeds.
//!
//! Payload keys follow the source systems' bronze-layer conventions:
//! encounter feeds carry `encounter_date`/`encounter_type` and an optional
//! nested `raw_data` document, lab feeds carry `result_date`/`test_code`,
//! imaging feeds `study_date`/`modality`, and medication feeds
//! `start_date`/`medication_name`.

pub mod codes;

use crate::domain::errors::NormalizeError;
use crate::domain::event::{DataQualityFlag, EventType, JourneyEvent, JourneyEventBuilder, RawEvent};
use crate::domain::ids::{EncounterId, EventId, FacilityId, PatientId, ProviderId};
use crate::domain::patient::Demographics;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Payload keys probed, in order, for the event timestamp
const TIMESTAMP_KEYS: [&str; 6] = [
    "event_datetime",
    "encounter_date",
    "result_date",
    "study_date",
    "start_date",
    "timestamp",
];

/// Payload keys probed, in order, for the event identifier
const EVENT_ID_KEYS: [&str; 5] = [
    "event_id",
    "lab_result_id",
    "study_id",
    "medication_id",
    "assessment_id",
];

/// Stateless translator from raw payloads to canonical journey events
#[derive(Debug, Default)]
pub struct Normalizer;

impl Normalizer {
    /// Creates a new normalizer
    pub fn new() -> Self {
        Self
    }

    /// Normalizes one raw event into a canonical journey event
    ///
    /// Exactly one event is produced per valid input, tagged with the raw
    /// record's source system. Data-quality issues are attached to the event
    /// and also returned for the caller's bookkeeping.
    ///
    /// # Errors
    ///
    /// Fails only when the patient identifier or the timestamp is absent or
    /// unparseable; such records are routed to the dead-letter sink by the
    /// caller.
    pub fn normalize(
        &self,
        raw: &RawEvent,
    ) -> Result<(JourneyEvent, Vec<DataQualityFlag>), NormalizeError> {
        let payload = merged_payload(&raw.payload);

        let patient_id = string_field(&payload, "patient_id")
            .and_then(|s| PatientId::new(s).ok())
            .ok_or(NormalizeError::MissingPatientId)?;

        let event_datetime = extract_timestamp(&payload)?;

        let mut flags = Vec::new();

        let event_type = match extract_event_type(&payload) {
            TypeResolution::Known(event_type) => event_type,
            TypeResolution::Unknown(raw_type) => {
                flags.push(DataQualityFlag::UnknownEventType(raw_type));
                EventType::Assessment
            }
            TypeResolution::Absent => {
                flags.push(DataQualityFlag::MissingEventType);
                EventType::Assessment
            }
        };

        let encounter_id = string_field(&payload, "encounter_id").and_then(|s| EncounterId::new(s).ok());
        if encounter_id.is_none() {
            flags.push(DataQualityFlag::MissingEncounterId);
        }

        let facility_id = string_field(&payload, "facility_id")
            .or_else(|| string_field(&payload, "lab_facility"))
            .and_then(|s| FacilityId::new(s).ok());
        if facility_id.is_none() {
            flags.push(DataQualityFlag::MissingFacility);
        }

        let provider_id = string_field(&payload, "provider_id")
            .or_else(|| string_field(&payload, "prescriber_id"))
            .or_else(|| string_field(&payload, "radiologist_id"))
            .and_then(|s| ProviderId::new(s).ok());
        if provider_id.is_none() {
            flags.push(DataQualityFlag::MissingProvider);
        }

        let diagnosis_code = extract_diagnosis_code(&payload);
        if let Some(code) = &diagnosis_code {
            if !codes::is_valid_diagnosis_code(code) {
                flags.push(DataQualityFlag::InvalidDiagnosisCode(code.clone()));
            }
        }

        let procedure_codes = string_array(&payload, "procedure_codes");
        for code in &procedure_codes {
            if !codes::is_valid_procedure_code(code) {
                flags.push(DataQualityFlag::InvalidProcedureCode(code.clone()));
            }
        }

        let complications = string_array(&payload, "complications");

        let cost = number_field(&payload, "total_cost")
            .or_else(|| number_field(&payload, "cost_amount"));
        let cost = match cost {
            Some(value) if value < 0.0 => {
                flags.push(DataQualityFlag::NegativeCost);
                None
            }
            other => other,
        };

        let event_id = extract_event_id(&payload)
            .unwrap_or_else(|| fallback_event_id(&patient_id, event_datetime, event_type, raw));

        let mut builder = JourneyEventBuilder::new()
            .event_id(event_id)
            .patient_id(patient_id)
            .event_type(event_type)
            .event_datetime(event_datetime)
            .source_system(&raw.source_system)
            .procedure_codes(procedure_codes)
            .complications(complications);

        if let Some(encounter_id) = encounter_id {
            builder = builder.encounter_id(encounter_id);
        }
        if let Some(facility_id) = facility_id {
            builder = builder.facility_id(facility_id);
        }
        if let Some(provider_id) = provider_id {
            builder = builder.provider_id(provider_id);
        }
        if let Some(code) = diagnosis_code {
            builder = builder.diagnosis_code(code);
        }
        if let Some(cost) = cost {
            builder = builder.cost_amount(cost);
        }
        for flag in &flags {
            builder = builder.flag(flag.clone());
        }

        let event = builder
            .build()
            .expect("all required builder fields are set");

        Ok((event, flags))
    }

    /// Extracts demographic attributes carried on the raw payload
    ///
    /// Returns `None` when the payload carries no demographic fields at all.
    pub fn demographics(&self, raw: &RawEvent) -> Option<Demographics> {
        let payload = merged_payload(&raw.payload);
        let demographics = Demographics {
            date_of_birth: string_field(&payload, "date_of_birth")
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            gender: string_field(&payload, "gender"),
            insurance_type: string_field(&payload, "insurance_type"),
            zip_code: string_field(&payload, "zip_code"),
            medical_record_number: string_field(&payload, "medical_record_number"),
            primary_language: string_field(&payload, "primary_language"),
        };
        if demographics.is_empty() {
            None
        } else {
            Some(demographics)
        }
    }
}

enum TypeResolution {
    Known(EventType),
    Unknown(String),
    Absent,
}

/// Merges a nested `raw_data` document (object or JSON string) over the
/// top-level payload keys
///
/// Encounter feeds ship clinical detail (diagnosis codes, procedures,
/// complications, cost) inside `raw_data`; top-level keys win on collision.
fn merged_payload(payload: &Value) -> Value {
    let Some(object) = payload.as_object() else {
        return payload.clone();
    };

    let nested = match object.get("raw_data") {
        Some(Value::Object(map)) => Some(map.clone()),
        Some(Value::String(text)) => serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|v| v.as_object().cloned()),
        _ => None,
    };

    let Some(nested) = nested else {
        return payload.clone();
    };

    let mut merged = nested;
    for (key, value) in object {
        if key != "raw_data" {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(payload: &Value, key: &str) -> Option<f64> {
    match payload.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_array(payload: &Value, key: &str) -> Vec<String> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Parses the first timestamp key present on the payload
///
/// Accepted formats: RFC 3339, `%Y-%m-%d %H:%M:%S` (with optional
/// fractional seconds), `%Y-%m-%dT%H:%M:%S`, and bare dates (midnight UTC).
fn extract_timestamp(payload: &Value) -> Result<DateTime<Utc>, NormalizeError> {
    for key in TIMESTAMP_KEYS {
        let Some(text) = string_field(payload, key) else {
            continue;
        };
        return parse_timestamp(&text).ok_or(NormalizeError::UnparseableTimestamp(text));
    }
    Err(NormalizeError::MissingTimestamp)
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// Resolves the canonical event type from explicit or feed-specific keys
fn extract_event_type(payload: &Value) -> TypeResolution {
    if let Some(raw_type) = string_field(payload, "event_type") {
        return match raw_type.to_lowercase().as_str() {
            "admission" => TypeResolution::Known(EventType::Admission),
            "discharge" => TypeResolution::Known(EventType::Discharge),
            "lab_result" => TypeResolution::Known(EventType::LabResult),
            "imaging_study" => TypeResolution::Known(EventType::ImagingStudy),
            "medication_order" => TypeResolution::Known(EventType::MedicationOrder),
            "assessment" => TypeResolution::Known(EventType::Assessment),
            "outpatient_visit" => TypeResolution::Known(EventType::OutpatientVisit),
            "emergency_visit" => TypeResolution::Known(EventType::EmergencyVisit),
            _ => TypeResolution::Unknown(raw_type),
        };
    }

    if let Some(encounter_type) = string_field(payload, "encounter_type") {
        return match encounter_type.to_uppercase().as_str() {
            "IP" => TypeResolution::Known(EventType::Admission),
            "EM" => TypeResolution::Known(EventType::EmergencyVisit),
            "OP" | "AMB" => TypeResolution::Known(EventType::OutpatientVisit),
            "OB" => TypeResolution::Known(EventType::Assessment),
            _ => TypeResolution::Unknown(encounter_type),
        };
    }

    // Feed-specific signature keys
    if payload.get("test_code").is_some() {
        return TypeResolution::Known(EventType::LabResult);
    }
    if payload.get("modality").is_some() {
        return TypeResolution::Known(EventType::ImagingStudy);
    }
    if payload.get("medication_name").is_some() {
        return TypeResolution::Known(EventType::MedicationOrder);
    }

    TypeResolution::Absent
}

fn extract_diagnosis_code(payload: &Value) -> Option<String> {
    if let Some(code) = string_field(payload, "diagnosis_code") {
        return Some(code);
    }
    payload
        .get("diagnosis_codes")
        .and_then(Value::as_array)
        .and_then(|codes| codes.first())
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

fn extract_event_id(payload: &Value) -> Option<EventId> {
    for key in EVENT_ID_KEYS {
        if let Some(id) = string_field(payload, key).and_then(|s| EventId::new(s).ok()) {
            return Some(id);
        }
    }
    None
}

/// Derives a deterministic event identifier when the source supplies none
///
/// Deterministic so that a replay of the same record supersedes rather than
/// duplicates.
fn fallback_event_id(
    patient_id: &PatientId,
    event_datetime: DateTime<Utc>,
    event_type: EventType,
    raw: &RawEvent,
) -> EventId {
    EventId::new(format!(
        "{}:{}:{}:{}",
        raw.source_system,
        patient_id,
        event_datetime.timestamp(),
        event_type
    ))
    .expect("fallback id is never empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new()
    }

    #[test]
    fn test_minimal_valid_event() {
        let raw = RawEvent::new(
            "epic_adt",
            json!({
                "patient_id": "PAT000001",
                "event_datetime": "2025-03-01T08:00:00Z"
            }),
        );
        let (event, flags) = normalizer().normalize(&raw).unwrap();
        assert_eq!(event.patient_id.as_str(), "PAT000001");
        assert_eq!(event.source_system, "epic_adt");
        // Missing everything optional, but still ingested
        assert!(flags.contains(&DataQualityFlag::MissingEncounterId));
        assert!(flags.contains(&DataQualityFlag::MissingEventType));
        assert_eq!(event.data_quality_flags, flags);
    }

    #[test]
    fn test_missing_patient_id_fails() {
        let raw = RawEvent::new("epic_adt", json!({"event_datetime": "2025-03-01T08:00:00Z"}));
        assert_eq!(
            normalizer().normalize(&raw).unwrap_err(),
            NormalizeError::MissingPatientId
        );
    }

    #[test]
    fn test_missing_timestamp_fails() {
        let raw = RawEvent::new("epic_adt", json!({"patient_id": "PAT000001"}));
        assert_eq!(
            normalizer().normalize(&raw).unwrap_err(),
            NormalizeError::MissingTimestamp
        );
    }

    #[test]
    fn test_unparseable_timestamp_fails() {
        let raw = RawEvent::new(
            "epic_adt",
            json!({"patient_id": "PAT000001", "event_datetime": "not-a-date"}),
        );
        assert!(matches!(
            normalizer().normalize(&raw).unwrap_err(),
            NormalizeError::UnparseableTimestamp(_)
        ));
    }

    #[test]
    fn test_encounter_feed_mapping() {
        let raw = RawEvent::new(
            "encounter_feed",
            json!({
                "encounter_id": "ENC00000001",
                "patient_id": "PAT000001",
                "encounter_date": "2025-03-01 08:15:00",
                "encounter_type": "IP",
                "facility_id": "FAC001",
                "provider_id": "PROV002",
                "raw_data": {
                    "diagnosis_codes": ["I50.9", "E11.9"],
                    "procedure_codes": ["99232", "85025"],
                    "total_cost": 6120.55,
                    "complications": ["Infection"]
                }
            }),
        );
        let (event, flags) = normalizer().normalize(&raw).unwrap();
        assert_eq!(event.event_type, EventType::Admission);
        assert_eq!(event.diagnosis_code.as_deref(), Some("I50.9"));
        assert_eq!(event.procedure_codes, vec!["99232", "85025"]);
        assert_eq!(event.complications, vec!["Infection"]);
        assert_eq!(event.cost_amount, Some(6120.55));
        assert!(event.cost_from_source);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_raw_data_as_json_string() {
        let raw = RawEvent::new(
            "encounter_feed",
            json!({
                "patient_id": "PAT000001",
                "encounter_date": "2025-03-01 08:15:00",
                "encounter_type": "EM",
                "raw_data": "{\"total_cost\": 1500.0}"
            }),
        );
        let (event, _) = normalizer().normalize(&raw).unwrap();
        assert_eq!(event.event_type, EventType::EmergencyVisit);
        assert_eq!(event.cost_amount, Some(1500.0));
    }

    #[test]
    fn test_lab_feed_inferred_type() {
        let raw = RawEvent::new(
            "lab_feed",
            json!({
                "lab_result_id": "LAB00000001",
                "patient_id": "PAT000001",
                "encounter_id": "ENC00000001",
                "test_code": "CBC",
                "result_date": "2025-03-01T12:00:00Z",
                "lab_facility": "Central Lab"
            }),
        );
        let (event, _) = normalizer().normalize(&raw).unwrap();
        assert_eq!(event.event_type, EventType::LabResult);
        assert_eq!(event.event_id.as_str(), "LAB00000001");
        assert_eq!(event.facility_id.as_ref().unwrap().as_str(), "Central Lab");
    }

    #[test]
    fn test_invalid_codes_flagged_not_rejected() {
        let raw = RawEvent::new(
            "encounter_feed",
            json!({
                "patient_id": "PAT000001",
                "event_datetime": "2025-03-01T08:00:00Z",
                "event_type": "admission",
                "diagnosis_code": "bogus",
                "procedure_codes": ["99213", "bad-code"]
            }),
        );
        let (event, flags) = normalizer().normalize(&raw).unwrap();
        assert!(flags.contains(&DataQualityFlag::InvalidDiagnosisCode("bogus".to_string())));
        assert!(flags.contains(&DataQualityFlag::InvalidProcedureCode("bad-code".to_string())));
        // Flagged codes are retained, not stripped
        assert_eq!(event.diagnosis_code.as_deref(), Some("bogus"));
        assert_eq!(event.procedure_codes.len(), 2);
    }

    #[test]
    fn test_unknown_event_type_flagged() {
        let raw = RawEvent::new(
            "encounter_feed",
            json!({
                "patient_id": "PAT000001",
                "event_datetime": "2025-03-01T08:00:00Z",
                "event_type": "teleportation"
            }),
        );
        let (event, flags) = normalizer().normalize(&raw).unwrap();
        assert_eq!(event.event_type, EventType::Assessment);
        assert!(flags
            .iter()
            .any(|f| matches!(f, DataQualityFlag::UnknownEventType(t) if t == "teleportation")));
    }

    #[test]
    fn test_negative_cost_discarded_and_flagged() {
        let raw = RawEvent::new(
            "encounter_feed",
            json!({
                "patient_id": "PAT000001",
                "event_datetime": "2025-03-01T08:00:00Z",
                "event_type": "discharge",
                "total_cost": -12.0
            }),
        );
        let (event, flags) = normalizer().normalize(&raw).unwrap();
        assert!(flags.contains(&DataQualityFlag::NegativeCost));
        assert!(event.cost_amount.is_none());
    }

    #[test]
    fn test_fallback_event_id_is_deterministic() {
        let payload = json!({
            "patient_id": "PAT000001",
            "event_datetime": "2025-03-01T08:00:00Z",
            "event_type": "admission"
        });
        let (a, _) = normalizer()
            .normalize(&RawEvent::new("feed", payload.clone()))
            .unwrap();
        let (b, _) = normalizer()
            .normalize(&RawEvent::new("feed", payload))
            .unwrap();
        assert_eq!(a.event_id, b.event_id);
    }

    #[test]
    fn test_demographics_extraction() {
        let raw = RawEvent::new(
            "encounter_feed",
            json!({
                "patient_id": "PAT000001",
                "event_datetime": "2025-03-01T08:00:00Z",
                "date_of_birth": "1954-07-12",
                "gender": "F",
                "insurance_type": "Medicare",
                "zip_code": "411001"
            }),
        );
        let demographics = normalizer().demographics(&raw).unwrap();
        assert_eq!(
            demographics.date_of_birth,
            NaiveDate::from_ymd_opt(1954, 7, 12)
        );
        assert_eq!(demographics.gender.as_deref(), Some("F"));
        assert_eq!(demographics.insurance_type.as_deref(), Some("Medicare"));

        let bare = RawEvent::new(
            "lab_feed",
            json!({"patient_id": "PAT000001", "result_date": "2025-03-01T08:00:00Z"}),
        );
        assert!(normalizer().demographics(&bare).is_none());
    }

    #[test]
    fn test_date_only_timestamp_parses_to_midnight() {
        let raw = RawEvent::new(
            "medication_feed",
            json!({
                "medication_id": "MED00000001",
                "patient_id": "PAT000001",
                "medication_name": "Lisinopril",
                "start_date": "2025-03-04"
            }),
        );
        let (event, _) = normalizer().normalize(&raw).unwrap();
        assert_eq!(event.event_type, EventType::MedicationOrder);
        assert_eq!(event.event_datetime.format("%H:%M").to_string(), "00:00");
    }
}
