//! Clinical-record store boundary.
//!
//! The store is a black box answering FHIR search strings with arrays of
//! loosely-typed resources. Everything downstream decodes those arrays
//! through `models::fhir` projections.

pub mod http;
pub mod mock;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::models::fhir::{decode_records, FhirResource, Patient};

pub use http::{HttpRecordStore, HttpRecordStoreProvider};
pub use mock::InMemoryRecordStore;

#[derive(Error, Debug)]
pub enum RecordStoreError {
    #[error("Record store is not reachable at {0}")]
    Connection(String),

    #[error("Record store request timed out after {0}s")]
    Timeout(u64),

    #[error("Record store returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed record store response: {0}")]
    Decode(String),

    #[error("Query points outside the record store: {0}")]
    ForeignUrl(String),
}

/// Options forwarded with each query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Unwrap search bundles into their entry resources.
    pub flat: bool,
}

impl RequestOptions {
    pub fn flat() -> Self {
        Self { flat: true }
    }

    pub fn raw() -> Self {
        Self { flat: false }
    }
}

/// `request(query, options) -> resources`, the only capability the pipeline needs.
pub trait RecordStore: Send + Sync {
    fn request<'a>(
        &'a self,
        query: &'a str,
        options: RequestOptions,
    ) -> BoxFuture<'a, Result<Vec<Value>, RecordStoreError>>;
}

/// Hands out a store bound to the caller's access token.
pub trait RecordStoreProvider: Send + Sync {
    fn open(&self, access_token: Option<&str>) -> Arc<dyn RecordStore>;
}

/// Provider that always returns the same store (tests, fixed deployments).
pub struct StaticRecordStoreProvider(pub Arc<dyn RecordStore>);

impl RecordStoreProvider for StaticRecordStoreProvider {
    fn open(&self, _access_token: Option<&str>) -> Arc<dyn RecordStore> {
        Arc::clone(&self.0)
    }
}

// ── Search strings ──────────────────────────────────────────

const MAX_ID_LEN: usize = 64;

/// FHIR logical id: 1 to 64 of `[A-Za-z0-9-.]`.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// Relative literal reference `ResourceType/id`, e.g. `Practitioner/42`.
pub fn is_relative_reference(reference: &str) -> bool {
    let Some((resource_type, id)) = reference.split_once('/') else {
        return false;
    };
    resource_type.starts_with(|c: char| c.is_ascii_uppercase())
        && resource_type.chars().all(|c| c.is_ascii_alphabetic())
        && is_valid_id(id)
}

pub fn patient_query(patient_id: &str) -> String {
    format!("Patient?_id={patient_id}")
}

/// `<ResourceType>?patient=<id>`
pub fn patient_scoped_query<T: FhirResource>(patient_id: &str) -> String {
    format!("{}?patient={}", T::RESOURCE_TYPE, patient_id)
}

/// Fetch a flat result list and decode it into typed records.
pub async fn fetch_records<T: FhirResource>(
    store: &dyn RecordStore,
    query: &str,
) -> Result<Vec<T>, RecordStoreError> {
    let values = store.request(query, RequestOptions::flat()).await?;
    tracing::debug!(
        resource_type = T::RESOURCE_TYPE,
        count = values.len(),
        "Fetched records"
    );
    Ok(decode_records(values))
}

pub async fn fetch_patient(
    store: &dyn RecordStore,
    patient_id: &str,
) -> Result<Option<Patient>, RecordStoreError> {
    let patients: Vec<Patient> = fetch_records(store, &patient_query(patient_id)).await?;
    Ok(patients.into_iter().next())
}
