//! In-memory journey store
//!
//! Holds the patient registry and one [`PatientJourney`] arena per patient.
//! Each journey sits behind its own async mutex, giving the pipeline its
//! single-writer-per-patient discipline: sequencing and derivation for one
//! patient are strictly serialized, while different patients proceed in
//! parallel with no shared mutable state.

use crate::core::audit::AuditRecorder;
use crate::core::sequence::PatientJourney;
use crate::domain::patient::{Demographics, Patient};
use crate::domain::{AuditOperation, PatientId, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Registry of patients and their journey arenas
#[derive(Default)]
pub struct JourneyStore {
    patients: RwLock<HashMap<PatientId, Patient>>,
    journeys: RwLock<HashMap<PatientId, Arc<Mutex<PatientJourney>>>>,
}

impl JourneyStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the journey handle for a patient, creating an empty arena on
    /// first sight
    ///
    /// The returned mutex is the patient's single-writer lock: hold it for
    /// the full sequence-and-derive unit of work.
    pub fn journey_handle(&self, patient_id: &PatientId) -> Arc<Mutex<PatientJourney>> {
        if let Some(handle) = self
            .journeys
            .read()
            .expect("journey map lock poisoned")
            .get(patient_id)
        {
            return handle.clone();
        }

        let mut journeys = self.journeys.write().expect("journey map lock poisoned");
        journeys
            .entry(patient_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(PatientJourney::new(patient_id.clone()))))
            .clone()
    }

    /// Returns the journey handle only if the patient is already known
    pub fn existing_journey_handle(
        &self,
        patient_id: &PatientId,
    ) -> Option<Arc<Mutex<PatientJourney>>> {
        self.journeys
            .read()
            .expect("journey map lock poisoned")
            .get(patient_id)
            .cloned()
    }

    /// Creates or updates the patient record, last-write-wins per
    /// demographic field
    ///
    /// The mutation is audited before it is applied; an audit failure fails
    /// the upsert and leaves the registry untouched.
    ///
    /// # Errors
    ///
    /// Returns an error when audit recording fails.
    pub async fn upsert_patient(
        &self,
        patient_id: &PatientId,
        demographics: Option<Demographics>,
        recorder: &AuditRecorder,
    ) -> Result<()> {
        let existing = self
            .patients
            .read()
            .expect("patient map lock poisoned")
            .get(patient_id)
            .cloned();

        match existing {
            None => {
                let patient =
                    Patient::new(patient_id.clone(), demographics.unwrap_or_default());
                recorder
                    .record(
                        "patient",
                        AuditOperation::Insert,
                        None,
                        Some(serde_json::to_value(&patient)?),
                    )
                    .await?;
                self.patients
                    .write()
                    .expect("patient map lock poisoned")
                    .insert(patient_id.clone(), patient);
            }
            Some(mut patient) => {
                let Some(demographics) = demographics else {
                    return Ok(());
                };
                let before = serde_json::to_value(&patient)?;
                if !patient.apply_update(&demographics) {
                    return Ok(());
                }
                recorder
                    .record(
                        "patient",
                        AuditOperation::Update,
                        Some(before),
                        Some(serde_json::to_value(&patient)?),
                    )
                    .await?;
                self.patients
                    .write()
                    .expect("patient map lock poisoned")
                    .insert(patient_id.clone(), patient);
            }
        }
        Ok(())
    }

    /// Looks up a patient record
    pub fn patient(&self, patient_id: &PatientId) -> Option<Patient> {
        self.patients
            .read()
            .expect("patient map lock poisoned")
            .get(patient_id)
            .cloned()
    }

    /// All patient IDs known to the store, sorted for determinism
    pub fn patient_ids(&self) -> Vec<PatientId> {
        let mut ids: Vec<PatientId> = self
            .journeys
            .read()
            .expect("journey map lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::audit::{FailingAuditSink, MemoryAuditSink};

    fn recorder(sink: Arc<MemoryAuditSink>) -> AuditRecorder {
        AuditRecorder::new(sink, "test")
    }

    #[tokio::test]
    async fn test_journey_handle_created_once() {
        let store = JourneyStore::new();
        let id = PatientId::new("PAT000001").unwrap();
        let a = store.journey_handle(&id);
        let b = store.journey_handle(&id);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(store.existing_journey_handle(&id).is_some());
        assert!(store
            .existing_journey_handle(&PatientId::new("PAT999999").unwrap())
            .is_none());
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let store = JourneyStore::new();
        let sink = Arc::new(MemoryAuditSink::new());
        let recorder = recorder(sink.clone());
        let id = PatientId::new("PAT000001").unwrap();

        store.upsert_patient(&id, None, &recorder).await.unwrap();
        assert!(store.patient(&id).is_some());

        let update = Demographics {
            gender: Some("F".to_string()),
            ..Default::default()
        };
        store
            .upsert_patient(&id, Some(update), &recorder)
            .await
            .unwrap();
        assert_eq!(
            store.patient(&id).unwrap().demographics.gender.as_deref(),
            Some("F")
        );

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].operation, AuditOperation::Insert);
        assert_eq!(records[1].operation, AuditOperation::Update);
    }

    #[tokio::test]
    async fn test_no_audit_record_for_no_op_update() {
        let store = JourneyStore::new();
        let sink = Arc::new(MemoryAuditSink::new());
        let recorder = recorder(sink.clone());
        let id = PatientId::new("PAT000001").unwrap();

        let demographics = Demographics {
            gender: Some("F".to_string()),
            ..Default::default()
        };
        store
            .upsert_patient(&id, Some(demographics.clone()), &recorder)
            .await
            .unwrap();
        store
            .upsert_patient(&id, Some(demographics), &recorder)
            .await
            .unwrap();

        // Insert audited once; the identical update produced no record
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_audit_failure_fails_upsert() {
        let store = JourneyStore::new();
        let recorder = AuditRecorder::new(Arc::new(FailingAuditSink), "test");
        let id = PatientId::new("PAT000001").unwrap();

        let result = store.upsert_patient(&id, None, &recorder).await;
        assert!(result.is_err());
        // The write was not applied
        assert!(store.patient(&id).is_none());
    }
}
