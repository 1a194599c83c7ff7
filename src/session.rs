//! Explicit session context threaded through collectors and page loads.
//!
//! Holds what a launched session knows: the patient id, the access token,
//! the `fhirUser` reference of the signed-in user and a record-store handle.
//! The patient and user slots are filled lazily by page loads.

use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::models::fhir::Patient;
use crate::records::{is_relative_reference, RecordStore, RequestOptions};

pub struct Session {
    patient_fhir_id: Option<String>,
    access_token: Option<String>,
    fhir_user: Option<String>,
    store: Arc<dyn RecordStore>,
    patient: RwLock<Option<Patient>>,
    user: RwLock<Option<Value>>,
}

impl Session {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            patient_fhir_id: None,
            access_token: None,
            fhir_user: None,
            store,
            patient: RwLock::new(None),
            user: RwLock::new(None),
        }
    }

    pub fn with_patient_id(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_fhir_id = Some(patient_id.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_fhir_user(mut self, reference: impl Into<String>) -> Self {
        self.fhir_user = Some(reference.into());
        self
    }

    pub fn patient_fhir_id(&self) -> Option<&str> {
        self.patient_fhir_id.as_deref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn fhir_user(&self) -> Option<&str> {
        self.fhir_user.as_deref()
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn patient(&self) -> Option<Patient> {
        self.patient.read().ok().and_then(|p| p.clone())
    }

    /// Store `patient` unless one is already set. Returns whether it was stored.
    pub fn set_patient_if_absent(&self, patient: Patient) -> bool {
        match self.patient.write() {
            Ok(mut slot) if slot.is_none() => {
                *slot = Some(patient);
                true
            }
            _ => false,
        }
    }

    pub fn user(&self) -> Option<Value> {
        self.user.read().ok().and_then(|u| u.clone())
    }

    pub fn set_user(&self, user: Value) {
        if let Ok(mut slot) = self.user.write() {
            *slot = Some(user);
        }
    }

    /// Best-effort lookup of the signed-in user's resource.
    ///
    /// Runs only when a `fhirUser` reference is known and no user is cached.
    /// A failure is logged and swallowed.
    pub async fn refresh_user(&self) {
        let Some(reference) = self.fhir_user.as_deref() else {
            return;
        };
        if self.user().is_some() {
            return;
        }
        if !is_relative_reference(reference) {
            tracing::debug!(reference, "Skipping current user lookup for non-relative reference");
            return;
        }

        match self.store.request(reference, RequestOptions::raw()).await {
            Ok(mut resources) if !resources.is_empty() => self.set_user(resources.remove(0)),
            Ok(_) => tracing::debug!(reference, "Current user lookup returned nothing"),
            Err(e) => tracing::debug!(reference, error = %e, "Current user lookup failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::InMemoryRecordStore;
    use serde_json::json;

    fn session_with(store: InMemoryRecordStore) -> Session {
        Session::new(Arc::new(store))
            .with_patient_id("p1")
            .with_access_token("token")
    }

    #[test]
    fn patient_written_only_once() {
        let session = session_with(InMemoryRecordStore::new());
        let first = Patient {
            id: Some("p1".into()),
            ..Default::default()
        };
        let second = Patient {
            id: Some("other".into()),
            ..Default::default()
        };
        assert!(session.set_patient_if_absent(first));
        assert!(!session.set_patient_if_absent(second));
        assert_eq!(session.patient().unwrap().id.as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn refresh_user_stores_resource() {
        let store = InMemoryRecordStore::new()
            .with_records("Practitioner/9", vec![json!({ "resourceType": "Practitioner" })]);
        let session = session_with(store).with_fhir_user("Practitioner/9");
        session.refresh_user().await;
        assert_eq!(session.user().unwrap()["resourceType"], "Practitioner");
    }

    #[tokio::test]
    async fn refresh_user_failure_is_swallowed() {
        let store = InMemoryRecordStore::new().with_failure("Practitioner/9");
        let session = session_with(store).with_fhir_user("Practitioner/9");
        session.refresh_user().await;
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn refresh_user_noop_without_reference() {
        let store = InMemoryRecordStore::new();
        let session = session_with(store.clone());
        session.refresh_user().await;
        assert!(store.requested().is_empty());
    }

    #[tokio::test]
    async fn absolute_user_reference_is_not_fetched() {
        let store = InMemoryRecordStore::new();
        let session = session_with(store.clone()).with_fhir_user("http://127.0.0.1:9/steal");
        session.refresh_user().await;
        assert!(store.requested().is_empty());
        assert!(session.user().is_none());
    }
}
