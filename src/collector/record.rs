//! Record-driven collector: conditions come from the clinical-record store.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Serialize;

use super::{CollectError, Collector, RawFamilyData};
use crate::aggregator::{dedupe_labels, group_family_histories};
use crate::models::fhir::{AllergyIntolerance, Condition, FamilyMemberHistory, Immunization};
use crate::records::{fetch_records, patient_scoped_query};
use crate::session::Session;

/// Typed records fetched for one patient, kept for display next to the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordBundle {
    pub patient_id: String,
    pub conditions: Vec<Condition>,
    pub immunizations: Vec<Immunization>,
    pub allergies: Vec<AllergyIntolerance>,
    pub family_histories: Vec<FamilyMemberHistory>,
}

impl RecordBundle {
    pub fn to_raw_family_data(&self) -> RawFamilyData {
        let family = group_family_histories(&self.family_histories);
        RawFamilyData {
            root_id: self.patient_id.clone(),
            root_conditions: dedupe_labels(&self.conditions),
            root_immunizations: dedupe_labels(&self.immunizations),
            root_allergies: dedupe_labels(&self.allergies),
            father_conditions: family.father,
            mother_conditions: family.mother,
            sibling_conditions: family.sibling,
        }
    }
}

pub struct RecordCollector<'a> {
    session: &'a Session,
}

impl<'a> RecordCollector<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Fetch the four record lists concurrently. The best-effort user
    /// lookup runs alongside and never affects the result.
    pub async fn fetch_bundle(&self) -> Result<RecordBundle, CollectError> {
        let patient_id = self
            .session
            .patient_fhir_id()
            .ok_or(CollectError::NoPatient)?;
        let store = self.session.store();

        let condition_query = patient_scoped_query::<Condition>(patient_id);
        let immunization_query = patient_scoped_query::<Immunization>(patient_id);
        let allergy_query = patient_scoped_query::<AllergyIntolerance>(patient_id);
        let history_query = patient_scoped_query::<FamilyMemberHistory>(patient_id);

        let (records, ()) = tokio::join!(
            async {
                tokio::try_join!(
                    fetch_records::<Condition>(store, &condition_query),
                    fetch_records::<Immunization>(store, &immunization_query),
                    fetch_records::<AllergyIntolerance>(store, &allergy_query),
                    fetch_records::<FamilyMemberHistory>(store, &history_query),
                )
            },
            self.session.refresh_user(),
        );
        let (conditions, immunizations, allergies, family_histories) = records?;

        tracing::info!(
            patient_id,
            conditions = conditions.len(),
            immunizations = immunizations.len(),
            allergies = allergies.len(),
            family_histories = family_histories.len(),
            "Collected clinical records"
        );

        Ok(RecordBundle {
            patient_id: patient_id.to_string(),
            conditions,
            immunizations,
            allergies,
            family_histories,
        })
    }
}

impl Collector for RecordCollector<'_> {
    fn collect(&self) -> BoxFuture<'_, Result<RawFamilyData, CollectError>> {
        async move { Ok(self.fetch_bundle().await?.to_raw_family_data()) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::InMemoryRecordStore;
    use serde_json::json;
    use std::sync::Arc;

    fn coded(display: &str) -> serde_json::Value {
        json!({ "coding": [{ "display": display }] })
    }

    fn populated_store() -> InMemoryRecordStore {
        InMemoryRecordStore::new()
            .with_records(
                "Condition?patient=p1",
                vec![
                    json!({ "code": coded("Diabetes") }),
                    json!({ "code": coded("Diabetes") }),
                    json!({ "code": coded("Hypertension") }),
                ],
            )
            .with_records(
                "Immunization?patient=p1",
                vec![json!({ "vaccineCode": coded("Influenza") })],
            )
            .with_records(
                "FamilyMemberHistory?patient=p1",
                vec![
                    json!({
                        "relationship": coded("Brother"),
                        "condition": [{ "code": coded("Asthma") }]
                    }),
                    json!({
                        "relationship": coded("Mother"),
                        "condition": [{ "code": { "text": "Cancer" } }]
                    }),
                ],
            )
    }

    #[tokio::test]
    async fn collects_and_normalizes_records() {
        let session = Session::new(Arc::new(populated_store())).with_patient_id("p1");
        let raw = RecordCollector::new(&session).collect().await.unwrap();

        assert_eq!(raw.root_id, "p1");
        assert_eq!(raw.root_conditions.join(), "Diabetes Hypertension");
        assert_eq!(raw.root_immunizations.join(), "Influenza");
        assert!(raw.root_allergies.is_empty());
        assert_eq!(raw.sibling_conditions.join(), "Asthma");
        assert_eq!(raw.mother_conditions.join(), "Cancer");
        assert!(raw.father_conditions.is_empty());
    }

    #[tokio::test]
    async fn issues_all_four_queries() {
        let store = populated_store();
        let session = Session::new(Arc::new(store.clone())).with_patient_id("p1");
        RecordCollector::new(&session).fetch_bundle().await.unwrap();

        let mut requested = store.requested();
        requested.sort();
        assert_eq!(
            requested,
            vec![
                "AllergyIntolerance?patient=p1",
                "Condition?patient=p1",
                "FamilyMemberHistory?patient=p1",
                "Immunization?patient=p1",
            ]
        );
    }

    #[tokio::test]
    async fn user_lookup_failure_does_not_fail_collection() {
        let store = populated_store().with_failure("Practitioner/1");
        let session = Session::new(Arc::new(store))
            .with_patient_id("p1")
            .with_fhir_user("Practitioner/1");
        assert!(RecordCollector::new(&session).collect().await.is_ok());
    }

    #[tokio::test]
    async fn fetch_failure_propagates() {
        let store = populated_store().with_failure("Immunization?patient=p1");
        let session = Session::new(Arc::new(store)).with_patient_id("p1");
        let err = RecordCollector::new(&session).collect().await.unwrap_err();
        assert!(matches!(err, CollectError::RecordStore(_)));
    }

    #[tokio::test]
    async fn missing_patient_id() {
        let session = Session::new(Arc::new(InMemoryRecordStore::new()));
        let err = RecordCollector::new(&session).collect().await.unwrap_err();
        assert!(matches!(err, CollectError::NoPatient));
    }
}
