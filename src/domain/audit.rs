//! Audit record model
//!
//! Every mutation to normalized or aggregate state produces exactly one
//! append-only audit record before the mutation is considered durable.
//! Records are never rewritten or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Kind of state mutation being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    /// A new record was created
    Insert,
    /// An existing record was modified in place
    Update,
    /// An event version was replaced by a corrected record
    Supersede,
    /// A patient's journey was renumbered
    Resequence,
    /// An aggregate snapshot was refreshed
    Refresh,
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Supersede => "supersede",
            Self::Resequence => "resequence",
            Self::Refresh => "refresh",
        };
        write!(f, "{name}")
    }
}

/// One append-only lineage record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record identifier
    pub record_id: Uuid,

    /// Entity name the mutation applies to (e.g. "journey_event",
    /// "patient", "patient_snapshot")
    pub entity: String,

    /// Kind of mutation
    pub operation: AuditOperation,

    /// Entity state before the mutation, if it existed
    pub before: Option<serde_json::Value>,

    /// Entity state after the mutation
    pub after: Option<serde_json::Value>,

    /// Actor responsible for the mutation (pipeline stage or configured
    /// service identity)
    pub actor: String,

    /// When the mutation was recorded
    pub recorded_at: DateTime<Utc>,

    /// SHA-256 checksum over the before/after payloads
    pub checksum: String,
}

impl AuditRecord {
    /// Creates a new audit record, computing the content checksum
    pub fn new(
        entity: impl Into<String>,
        operation: AuditOperation,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
        actor: impl Into<String>,
    ) -> Self {
        let checksum = Self::checksum_of(&before, &after);
        Self {
            record_id: Uuid::new_v4(),
            entity: entity.into(),
            operation,
            before,
            after,
            actor: actor.into(),
            recorded_at: Utc::now(),
            checksum,
        }
    }

    /// Computes the SHA-256 checksum over the before/after payloads
    fn checksum_of(before: &Option<serde_json::Value>, after: &Option<serde_json::Value>) -> String {
        let mut hasher = Sha256::new();
        if let Some(before) = before {
            hasher.update(before.to_string().as_bytes());
        }
        hasher.update(b"|");
        if let Some(after) = after {
            hasher.update(after.to_string().as_bytes());
        }
        let digest = hasher.finalize();
        format!("{digest:x}")
    }

    /// Recomputes the checksum and compares against the stored value
    pub fn verify_checksum(&self) -> bool {
        Self::checksum_of(&self.before, &self.after) == self.checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checksum_is_stable() {
        let a = AuditRecord::new(
            "journey_event",
            AuditOperation::Insert,
            None,
            Some(json!({"event_id": "EVT001"})),
            "normalizer",
        );
        let b = AuditRecord::new(
            "journey_event",
            AuditOperation::Insert,
            None,
            Some(json!({"event_id": "EVT001"})),
            "normalizer",
        );
        assert_eq!(a.checksum, b.checksum);
        assert!(a.verify_checksum());
    }

    #[test]
    fn test_checksum_detects_tampering() {
        let mut record = AuditRecord::new(
            "patient",
            AuditOperation::Update,
            Some(json!({"gender": "F"})),
            Some(json!({"gender": "M"})),
            "normalizer",
        );
        record.after = Some(json!({"gender": "X"}));
        assert!(!record.verify_checksum());
    }

    #[test]
    fn test_distinct_record_ids() {
        let a = AuditRecord::new("patient", AuditOperation::Insert, None, None, "test");
        let b = AuditRecord::new("patient", AuditOperation::Insert, None, None, "test");
        assert_ne!(a.record_id, b.record_id);
    }
}
