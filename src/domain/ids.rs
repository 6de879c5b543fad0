//! Domain identifier types with validation
//!
//! This module provides newtype wrappers for the clinical identifiers used
//! throughout the pipeline. Each type prevents accidental mixing of ID kinds
//! and rejects empty identifiers at construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Patient identifier newtype wrapper
///
/// The stable identity of a patient across all source systems. Assigned
/// upstream of this pipeline; never reassigned once seen.
///
/// # Examples
///
/// ```
/// use meridian::domain::ids::PatientId;
/// use std::str::FromStr;
///
/// let patient_id = PatientId::from_str("PAT000042").unwrap();
/// assert_eq!(patient_id.as_str(), "PAT000042");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatientId(String);

impl PatientId {
    /// Creates a new PatientId from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty or blank.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Patient ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the patient ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PatientId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Journey event identifier newtype wrapper
///
/// Identifies a single clinical event across versions: a corrected source
/// record arriving with the same EventId supersedes the earlier version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    /// Creates a new EventId from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty or blank.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Event ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the event ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encounter identifier newtype wrapper
///
/// Groups the events of one clinical encounter (admission, labs, discharge).
/// Length-of-stay pairing matches Admission and Discharge events that share
/// an encounter ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncounterId(String);

impl EncounterId {
    /// Creates a new EncounterId from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty or blank.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Encounter ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the encounter ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EncounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EncounterId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for EncounterId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Facility identifier newtype wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FacilityId(String);

impl FacilityId {
    /// Creates a new FacilityId from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty or blank.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Facility ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the facility ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FacilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FacilityId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for FacilityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Provider identifier newtype wrapper
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(String);

impl ProviderId {
    /// Creates a new ProviderId from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty or blank.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Provider ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the provider ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ProviderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_id_creation() {
        let id = PatientId::new("PAT000001").unwrap();
        assert_eq!(id.as_str(), "PAT000001");
    }

    #[test]
    fn test_patient_id_empty_fails() {
        assert!(PatientId::new("").is_err());
        assert!(PatientId::new("   ").is_err());
    }

    #[test]
    fn test_patient_id_display() {
        let id = PatientId::new("PAT000001").unwrap();
        assert_eq!(format!("{}", id), "PAT000001");
    }

    #[test]
    fn test_patient_id_from_str() {
        let id: PatientId = "PAT000042".parse().unwrap();
        assert_eq!(id.as_str(), "PAT000042");
    }

    #[test]
    fn test_event_id_creation() {
        let id = EventId::new("ENC00000001-admit").unwrap();
        assert_eq!(id.as_str(), "ENC00000001-admit");
    }

    #[test]
    fn test_event_id_empty_fails() {
        assert!(EventId::new("").is_err());
    }

    #[test]
    fn test_encounter_id_creation() {
        let id = EncounterId::new("ENC00000001").unwrap();
        assert_eq!(id.as_str(), "ENC00000001");
    }

    #[test]
    fn test_facility_and_provider_ids() {
        let facility = FacilityId::new("FAC001").unwrap();
        let provider = ProviderId::new("PROV001").unwrap();
        assert_eq!(facility.as_str(), "FAC001");
        assert_eq!(provider.as_str(), "PROV001");
        assert!(FacilityId::new(" ").is_err());
        assert!(ProviderId::new("").is_err());
    }

    #[test]
    fn test_patient_id_serialization() {
        let id = PatientId::new("PAT000001").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: PatientId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
