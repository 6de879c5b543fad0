//! Domain error types
//!
//! This module defines the error hierarchy for the pipeline. All errors are
//! domain-specific and don't expose third-party types. Data-quality issues
//! are deliberately NOT errors; they are flags attached to events (see
//! [`crate::domain::event::DataQualityFlag`]).

use crate::domain::ids::PatientId;
use thiserror::Error;

/// Main pipeline error type
///
/// This is the primary error type used throughout the application.
/// It wraps stage-specific error types and provides context for error
/// handling.
#[derive(Debug, Error)]
pub enum MeridianError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Normalization errors (unrecoverable malformed input)
    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    /// Sequencing errors
    #[error("Sequencing error: {0}")]
    Sequencing(#[from] SequencingError),

    /// Snapshot materialization errors
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Audit recording errors; these fail the triggering write
    #[error("Audit error: {0}")]
    Audit(String),

    /// Event source errors
    #[error("Source error: {0}")]
    Source(String),

    /// Dead-letter sink errors
    #[error("Dead-letter error: {0}")]
    DeadLetter(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Unrecoverable normalization failures
///
/// A raw record failing with one of these can never be sequenced; it is
/// routed to the dead-letter sink with the original payload and never
/// retried by the core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// Patient identifier absent or blank
    #[error("Raw event carries no patient identifier")]
    MissingPatientId,

    /// Event timestamp absent
    #[error("Raw event carries no event timestamp")]
    MissingTimestamp,

    /// Event timestamp present but unparseable
    #[error("Unparseable event timestamp: {0}")]
    UnparseableTimestamp(String),
}

/// Sequencing invariant violations
#[derive(Debug, Error)]
pub enum SequencingError {
    /// Two events claimed the same sequence slot, or density was broken.
    /// Fatal to that patient's sequencing batch only; triggers a full
    /// re-sequence for the patient.
    #[error("Sequencing conflict for patient {patient_id}: {detail}")]
    Conflict {
        /// Patient whose journey hit the conflict
        patient_id: PatientId,
        /// Human-readable description of the violated invariant
        detail: String,
    },

    /// Journey lookup for a patient the store has never seen
    #[error("Unknown patient: {0}")]
    UnknownPatient(PatientId),
}

/// Snapshot refresh failures
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Refresh exhausted its bounded retry budget; the snapshot is marked
    /// stale and served as such rather than silently served as fresh.
    #[error("Snapshot refresh for {entity} failed after {attempts} attempts: {detail}")]
    RefreshFailed {
        /// Entity key of the snapshot (patient/provider/facility ID)
        entity: String,
        /// Number of attempts made before giving up
        attempts: usize,
        /// Last failure description
        detail: String,
    },
}

// Conversion from std::io::Error
impl From<std::io::Error> for MeridianError {
    fn from(err: std::io::Error) -> Self {
        MeridianError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for MeridianError {
    fn from(err: serde_json::Error) -> Self {
        MeridianError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for MeridianError {
    fn from(err: toml::de::Error) -> Self {
        MeridianError::Configuration(format!("TOML parse error: {err}"))
    }
}
