//! Prediction service boundary: request builder, response mapper, clients.

pub mod client;
pub mod payload;
pub mod risk;

use futures_util::future::BoxFuture;
use thiserror::Error;

pub use client::{HttpPredictionClient, MockPredictionClient};
pub use payload::{PatientEntry, PredictionPayload, RelationshipEntry};
pub use risk::{
    classify, ConditionRisk, OrderedMap, PredictionReport, PredictionResponse, Probabilities,
};

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Prediction service is not reachable at {0}")]
    Connection(String),

    #[error("Prediction request timed out after {0}s")]
    Timeout(u64),

    #[error("Prediction service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed prediction response: {0}")]
    Decode(String),
}

/// `POST /predict_proba`.
pub trait PredictionService: Send + Sync {
    fn predict<'a>(
        &'a self,
        payload: &'a PredictionPayload,
    ) -> BoxFuture<'a, Result<PredictionResponse, PredictionError>>;
}
