//! Patient domain model
//!
//! A patient record is created on the first event seen for a patient ID and
//! its demographics are updated last-write-wins as later events carry fresher
//! values. The patient ID itself never changes.

use super::ids::PatientId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Demographic attributes of a patient
///
/// All fields are optional: source systems differ in what they supply, and a
/// sparse record is still a valid patient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    /// Date of birth
    pub date_of_birth: Option<NaiveDate>,

    /// Gender as reported by the source
    pub gender: Option<String>,

    /// Insurance type (Private, Government, Self-Pay, Medicare, ...)
    pub insurance_type: Option<String>,

    /// Residential ZIP code
    pub zip_code: Option<String>,

    /// Medical record number in the originating system
    pub medical_record_number: Option<String>,

    /// Primary spoken language
    pub primary_language: Option<String>,
}

impl Demographics {
    /// Returns true when no demographic field is populated
    pub fn is_empty(&self) -> bool {
        self.date_of_birth.is_none()
            && self.gender.is_none()
            && self.insurance_type.is_none()
            && self.zip_code.is_none()
            && self.medical_record_number.is_none()
            && self.primary_language.is_none()
    }

    /// Merges fresher values over this record, last-write-wins per field
    ///
    /// A `None` in `incoming` never erases an existing value; absence of a
    /// field in a later source record is not a retraction.
    pub fn merge(&mut self, incoming: &Demographics) -> bool {
        let mut changed = false;
        macro_rules! take_if_present {
            ($field:ident) => {
                if let Some(value) = &incoming.$field {
                    if self.$field.as_ref() != Some(value) {
                        self.$field = Some(value.clone());
                        changed = true;
                    }
                }
            };
        }
        take_if_present!(date_of_birth);
        take_if_present!(gender);
        take_if_present!(insurance_type);
        take_if_present!(zip_code);
        take_if_present!(medical_record_number);
        take_if_present!(primary_language);
        changed
    }
}

/// A patient known to the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    /// Immutable patient identity
    pub patient_id: PatientId,

    /// Demographic attributes, last-write-wins
    pub demographics: Demographics,

    /// When the patient was first seen by the pipeline
    pub first_seen_at: DateTime<Utc>,

    /// When the demographics were last updated
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    /// Creates a patient record from its first-seen event
    pub fn new(patient_id: PatientId, demographics: Demographics) -> Self {
        let now = Utc::now();
        Self {
            patient_id,
            demographics,
            first_seen_at: now,
            updated_at: now,
        }
    }

    /// Applies a demographics update, returning true if anything changed
    pub fn apply_update(&mut self, incoming: &Demographics) -> bool {
        let changed = self.demographics.merge(incoming);
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }
}
