//! Record-driven prediction report: collect, aggregate, predict, map.

use std::sync::RwLock;

use serde::Serialize;
use thiserror::Error;

use crate::aggregator::build_graph;
use crate::collector::{CollectError, Collector, RawFamilyData, RecordCollector};
use crate::generation::LoadGeneration;
use crate::prediction::{
    PredictionError, PredictionPayload, PredictionReport, PredictionResponse, PredictionService,
};
use crate::session::Session;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),
}

/// One pass of the pipeline: collected labels, the request built from them,
/// and the service's answer.
#[derive(Debug, Clone)]
pub struct PredictionRun {
    pub records: RawFamilyData,
    pub payload: PredictionPayload,
    pub response: PredictionResponse,
}

/// Collect from either source, aggregate, build the request and predict.
pub async fn run_prediction(
    collector: &dyn Collector,
    predictor: &dyn PredictionService,
) -> Result<PredictionRun, ReportError> {
    let records = collector.collect().await?;
    let payload = PredictionPayload::from_graph(&build_graph(&records));
    let response = predictor.predict(&payload).await?;
    Ok(PredictionRun {
        records,
        payload,
        response,
    })
}

/// Normalized record labels next to the predictions made from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientReport {
    pub patient_id: String,
    pub records: RawFamilyData,
    pub prediction: PredictionReport,
}

/// Run the pipeline once and map the root subject's results.
pub async fn generate_report(
    collector: &dyn Collector,
    predictor: &dyn PredictionService,
) -> Result<PatientReport, ReportError> {
    let run = run_prediction(collector, predictor).await?;
    let prediction = PredictionReport::from_response(&run.response, &run.records.root_id);
    tracing::info!(
        patient_id = %run.records.root_id,
        subjects = run.payload.patients.len(),
        has_predictions = prediction.has_predictions(),
        "Prediction report ready"
    );
    Ok(PatientReport {
        patient_id: run.records.root_id.clone(),
        records: run.records,
        prediction,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportState {
    Idle,
    Loading,
    Ready { report: PatientReport },
    Failed { message: String },
}

/// Page-level holder of the latest report. Only the most recent load may
/// publish its outcome.
#[derive(Debug)]
pub struct ReportLoader {
    generation: LoadGeneration,
    state: RwLock<ReportState>,
}

impl Default for ReportLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportLoader {
    pub fn new() -> Self {
        Self {
            generation: LoadGeneration::new(),
            state: RwLock::new(ReportState::Idle),
        }
    }

    pub fn state(&self) -> ReportState {
        self.state
            .read()
            .map(|s| s.clone())
            .unwrap_or(ReportState::Idle)
    }

    fn set_state(&self, state: ReportState) {
        if let Ok(mut slot) = self.state.write() {
            *slot = state;
        }
    }

    /// Load for the session's patient. Without a patient id this is a no-op.
    pub async fn load(&self, session: &Session, predictor: &dyn PredictionService) -> ReportState {
        if session.patient_fhir_id().is_none() {
            tracing::debug!("No patient in session, skipping report load");
            return self.state();
        }

        let ticket = self.generation.begin();
        self.set_state(ReportState::Loading);

        let outcome = generate_report(&RecordCollector::new(session), predictor).await;
        if !self.generation.is_current(ticket) {
            tracing::debug!("Discarding superseded report load");
            return self.state();
        }

        let state = match outcome {
            Ok(report) => ReportState::Ready { report },
            Err(e) => {
                tracing::warn!(error = %e, "Report load failed");
                ReportState::Failed {
                    message: e.to_string(),
                }
            }
        };
        self.set_state(state.clone());
        state
    }

    /// Abandon the in-flight load, if any.
    pub fn cancel(&self) {
        self.generation.invalidate();
        if let Ok(mut slot) = self.state.write() {
            if *slot == ReportState::Loading {
                *slot = ReportState::Idle;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{AssessmentDraft, FormCollector};
    use crate::models::RiskTier;
    use crate::prediction::{MockPredictionClient, PredictionResponse};
    use crate::records::InMemoryRecordStore;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn store() -> InMemoryRecordStore {
        InMemoryRecordStore::new()
            .with_records(
                "Condition?patient=p1",
                vec![
                    json!({ "code": { "coding": [{ "display": "Diabetes" }] } }),
                    json!({ "code": { "text": "Hypertension" } }),
                ],
            )
            .with_records(
                "FamilyMemberHistory?patient=p1",
                vec![json!({
                    "relationship": { "coding": [{ "code": "FTH", "display": "father" }] },
                    "condition": [{ "code": { "text": "Cancer" } }]
                })],
            )
    }

    fn predictor() -> MockPredictionClient {
        let response: PredictionResponse = serde_json::from_value(json!({
            "probabilities": {
                "p1": { "Diabetes": 0.7, "Cancer": 0.39 },
                "father-p1": { "Cancer": 0.9 }
            }
        }))
        .unwrap();
        MockPredictionClient::new(response)
    }

    #[tokio::test]
    async fn record_flow_end_to_end() {
        let session = Session::new(Arc::new(store())).with_patient_id("p1");
        let predictor = predictor();
        let collector = RecordCollector::new(&session);
        let report = generate_report(&collector, &predictor).await.unwrap();

        let risks = report.prediction.risks.unwrap();
        assert_eq!(risks[0].tier, RiskTier::High);
        assert_eq!(risks[1].tier, RiskTier::Low);

        let sent = &predictor.received()[0];
        assert_eq!(sent.patients[0].patient_condition, "Diabetes Hypertension");
        assert_eq!(sent.patients[1].id, "father-p1");
        assert_eq!(sent.patients[1].patient_condition, "Cancer");
    }

    #[tokio::test]
    async fn form_and_record_sources_share_the_pipeline() {
        let mut draft = AssessmentDraft::new();
        draft.own.select("Diabetes");
        draft.own.select("Hypertension");
        draft.father.select("Cancer");
        let predictor = predictor();

        let form_run = run_prediction(&FormCollector::new(draft), &predictor)
            .await
            .unwrap();
        assert_eq!(form_run.records.root_id, "self-assessment");
        assert_eq!(form_run.payload.patients[0].patient_condition, "Diabetes Hypertension");
        assert_eq!(form_run.payload.relationships[0].id_patient, "father-self-assessment");

        let session = Session::new(Arc::new(store())).with_patient_id("p1");
        let record_run = run_prediction(&RecordCollector::new(&session), &predictor)
            .await
            .unwrap();
        assert_eq!(record_run.payload.patients[0].patient_condition, "Diabetes Hypertension");
        assert_eq!(record_run.payload.relationships[0].id_patient, "father-p1");
        assert_eq!(predictor.received().len(), 2);
    }

    #[tokio::test]
    async fn missing_patient_fails_collection() {
        let session = Session::new(Arc::new(store()));
        let err = generate_report(&RecordCollector::new(&session), &predictor())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Collect(CollectError::NoPatient)));
    }

    #[tokio::test]
    async fn loader_without_patient_stays_idle() {
        let loader = ReportLoader::new();
        let session = Session::new(Arc::new(store()));
        assert_eq!(loader.load(&session, &predictor()).await, ReportState::Idle);
    }

    #[tokio::test]
    async fn prediction_failure_is_error_state_without_stale_report() {
        let loader = ReportLoader::new();
        let session = Session::new(Arc::new(store())).with_patient_id("p1");
        assert!(matches!(
            loader.load(&session, &predictor()).await,
            ReportState::Ready { .. }
        ));

        let failing = MockPredictionClient::failing(500, "model crashed");
        let state = loader.load(&session, &failing).await;
        assert!(matches!(state, ReportState::Failed { .. }));
        assert_eq!(loader.state(), state);
    }

    #[tokio::test]
    async fn cancelled_load_does_not_publish() {
        let loader = ReportLoader::new();
        let session = Session::new(Arc::new(
            store().with_delay("Condition?patient=p1", Duration::from_millis(100)),
        ))
        .with_patient_id("p1");
        let predictor = predictor();

        let load = loader.load(&session, &predictor);
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            loader.cancel();
        };
        let (state, ()) = tokio::join!(load, cancel);

        assert_eq!(state, ReportState::Idle);
        assert_eq!(loader.state(), ReportState::Idle);
    }

    #[tokio::test]
    async fn newer_load_wins() {
        let loader = ReportLoader::new();
        let slow = Session::new(Arc::new(
            store().with_delay("Condition?patient=p1", Duration::from_millis(100)),
        ))
        .with_patient_id("p1");
        let fast = Session::new(Arc::new(store())).with_patient_id("p1");
        let failing = MockPredictionClient::failing(500, "x");
        let predictor = predictor();

        let first = loader.load(&slow, &failing);
        let second = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            loader.load(&fast, &predictor).await
        };
        let (_, latest) = tokio::join!(first, second);

        assert!(matches!(latest, ReportState::Ready { .. }));
        assert!(matches!(loader.state(), ReportState::Ready { .. }));
    }
}
