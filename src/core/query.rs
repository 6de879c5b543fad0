//! Read-only query boundary
//!
//! External consumers (dashboards, compliance tooling, downstream feature
//! pipelines) read journeys, readmission links, and aggregate snapshots
//! through this service. Every read is point-in-time consistent for its
//! entity: journey reads clone under the patient's lock, and snapshot reads
//! hand out the atomically published `Arc`.

use crate::core::materialize::SnapshotStore;
use crate::core::store::JourneyStore;
use crate::domain::errors::SequencingError;
use crate::domain::event::JourneyEvent;
use crate::domain::ids::{FacilityId, PatientId, ProviderId};
use crate::domain::patient::Patient;
use crate::domain::readmission::ReadmissionLink;
use crate::domain::snapshot::{
    FacilityUtilizationSnapshot, PatientMetricsSnapshot, ProviderPerformanceSnapshot,
};
use crate::domain::Result;
use std::sync::Arc;

/// Read-only access to pipeline state
#[derive(Clone)]
pub struct QueryService {
    store: Arc<JourneyStore>,
    snapshots: Arc<SnapshotStore>,
}

impl QueryService {
    /// Creates a query service over the given stores
    pub fn new(store: Arc<JourneyStore>, snapshots: Arc<SnapshotStore>) -> Self {
        Self { store, snapshots }
    }

    /// The patient's sequenced journey, in sequence order
    ///
    /// # Errors
    ///
    /// Returns [`SequencingError::UnknownPatient`] for a patient the
    /// pipeline has never seen.
    pub async fn journey(&self, patient_id: &PatientId) -> Result<Vec<JourneyEvent>> {
        let handle = self
            .store
            .existing_journey_handle(patient_id)
            .ok_or_else(|| SequencingError::UnknownPatient(patient_id.clone()))?;
        let journey = handle.lock().await;
        Ok(journey.events().to_vec())
    }

    /// The patient's current readmission links
    ///
    /// # Errors
    ///
    /// Returns [`SequencingError::UnknownPatient`] for an unknown patient.
    pub async fn readmission_links(&self, patient_id: &PatientId) -> Result<Vec<ReadmissionLink>> {
        let handle = self
            .store
            .existing_journey_handle(patient_id)
            .ok_or_else(|| SequencingError::UnknownPatient(patient_id.clone()))?;
        let journey = handle.lock().await;
        Ok(journey.links().to_vec())
    }

    /// The patient registry record
    pub fn patient(&self, patient_id: &PatientId) -> Option<Patient> {
        self.store.patient(patient_id)
    }

    /// The patient's aggregate snapshot, possibly stale
    pub fn patient_snapshot(&self, patient_id: &PatientId) -> Option<Arc<PatientMetricsSnapshot>> {
        self.snapshots.patient(patient_id)
    }

    /// A provider's windowed performance snapshot, possibly stale
    pub fn provider_snapshot(
        &self,
        provider_id: &ProviderId,
    ) -> Option<Arc<ProviderPerformanceSnapshot>> {
        self.snapshots.provider(provider_id)
    }

    /// A facility's windowed utilization snapshot, possibly stale
    pub fn facility_snapshot(
        &self,
        facility_id: &FacilityId,
    ) -> Option<Arc<FacilityUtilizationSnapshot>> {
        self.snapshots.facility(facility_id)
    }

    /// Every published patient snapshot
    pub fn all_patient_snapshots(&self) -> Vec<Arc<PatientMetricsSnapshot>> {
        self.snapshots.all_patients()
    }

    /// Every published provider snapshot
    pub fn all_provider_snapshots(&self) -> Vec<Arc<ProviderPerformanceSnapshot>> {
        self.snapshots.all_providers()
    }

    /// Every published facility snapshot
    pub fn all_facility_snapshots(&self) -> Vec<Arc<FacilityUtilizationSnapshot>> {
        self.snapshots.all_facilities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_patient_queries_fail() {
        let service = QueryService::new(
            Arc::new(JourneyStore::new()),
            Arc::new(SnapshotStore::new()),
        );
        let unknown = PatientId::new("PAT999999").unwrap();
        assert!(service.journey(&unknown).await.is_err());
        assert!(service.readmission_links(&unknown).await.is_err());
        assert!(service.patient_snapshot(&unknown).is_none());
    }
}
