//! Domain models and types for Meridian.
//!
//! This module contains the core domain models, types, and business rules
//! for the patient journey pipeline.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`PatientId`], [`EventId`],
//!   [`EncounterId`], [`FacilityId`], [`ProviderId`])
//! - **Canonical models** ([`JourneyEvent`], [`Patient`],
//!   [`ReadmissionLink`], the snapshot types, [`AuditRecord`])
//! - **Error types** ([`MeridianError`], [`NormalizeError`],
//!   [`SequencingError`], [`SnapshotError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Identifiers use the newtype pattern to prevent mixing different ID kinds:
//!
//! ```rust
//! use meridian::domain::{PatientId, EncounterId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let patient_id = PatientId::new("PAT000001")?;
//! let encounter_id = EncounterId::new("ENC00000001")?;
//!
//! // This won't compile - type safety prevents mixing IDs
//! // let wrong: PatientId = encounter_id;  // Compile error!
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod errors;
pub mod event;
pub mod ids;
pub mod patient;
pub mod readmission;
pub mod result;
pub mod snapshot;

// Re-export commonly used types for convenience
pub use audit::{AuditOperation, AuditRecord};
pub use errors::{MeridianError, NormalizeError, SequencingError, SnapshotError};
pub use event::{DataQualityFlag, EventType, JourneyEvent, JourneyEventBuilder, RawEvent};
pub use ids::{EncounterId, EventId, FacilityId, PatientId, ProviderId};
pub use patient::{Demographics, Patient};
pub use readmission::ReadmissionLink;
pub use result::Result;
pub use snapshot::{
    FacilityUtilizationSnapshot, PatientMetricsSnapshot, ProviderPerformanceSnapshot,
};
