use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::{PredictionError, PredictionPayload, PredictionResponse, PredictionService};

/// HTTP client for the hereditary-risk model.
#[derive(Clone)]
pub struct HttpPredictionClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpPredictionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PredictionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictionError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/predict_proba", self.base_url)
    }

    async fn post(
        &self,
        payload: &PredictionPayload,
    ) -> Result<PredictionResponse, PredictionError> {
        let url = self.endpoint();
        tracing::debug!(
            patients = payload.patients.len(),
            relationships = payload.relationships.len(),
            "Requesting risk prediction"
        );

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    PredictionError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    PredictionError::Timeout(self.timeout_secs)
                } else {
                    PredictionError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Prediction request failed");
            return Err(PredictionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<PredictionResponse>()
            .await
            .map_err(|e| PredictionError::Decode(e.to_string()))
    }
}

impl PredictionService for HttpPredictionClient {
    fn predict<'a>(
        &'a self,
        payload: &'a PredictionPayload,
    ) -> BoxFuture<'a, Result<PredictionResponse, PredictionError>> {
        self.post(payload).boxed()
    }
}

/// Canned prediction service for testing. Records every payload it receives.
#[derive(Clone)]
pub struct MockPredictionClient {
    response: Result<PredictionResponse, (u16, String)>,
    delay: Option<Duration>,
    received: Arc<Mutex<Vec<PredictionPayload>>>,
}

impl MockPredictionClient {
    pub fn new(response: PredictionResponse) -> Self {
        Self {
            response: Ok(response),
            delay: None,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer every request with a non-success status.
    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            response: Err((status, body.to_string())),
            delay: None,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn received(&self) -> Vec<PredictionPayload> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl PredictionService for MockPredictionClient {
    fn predict<'a>(
        &'a self,
        payload: &'a PredictionPayload,
    ) -> BoxFuture<'a, Result<PredictionResponse, PredictionError>> {
        async move {
            if let Ok(mut received) = self.received.lock() {
                received.push(payload.clone());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.response {
                Ok(response) => Ok(response.clone()),
                Err((status, body)) => Err(PredictionError::Status {
                    status: *status,
                    body: body.clone(),
                }),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::build_graph;
    use crate::collector::RawFamilyData;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn_model_stub() -> String {
        async fn predict(
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> Result<Json<Value>, StatusCode> {
            let content_type = headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if !content_type.starts_with("application/json") {
                return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE);
            }
            let Some(root) = body["patients"][0]["id"].as_str() else {
                return Err(StatusCode::UNPROCESSABLE_ENTITY);
            };
            if root == "boom" {
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
            Ok(Json(json!({
                "probabilities": { root: { "Diabetes": 0.81, "Asthma": 0.12 } }
            })))
        }

        let app = Router::new().route("/predict_proba", post(predict));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn payload(root: &str) -> PredictionPayload {
        let mut raw = RawFamilyData::new(root);
        raw.root_conditions.insert("Diabetes");
        PredictionPayload::from_graph(&build_graph(&raw))
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let client =
            HttpPredictionClient::new("http://model.local/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "http://model.local/predict_proba");
    }

    #[tokio::test]
    async fn posts_payload_and_decodes_probabilities() {
        let base = spawn_model_stub().await;
        let client = HttpPredictionClient::new(&base, Duration::from_secs(5)).unwrap();
        let response = client.predict(&payload("self-assessment")).await.unwrap();

        let root = response.for_subject("self-assessment", "self-assessment").unwrap();
        let names: Vec<_> = root.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Diabetes", "Asthma"]);
    }

    #[tokio::test]
    async fn server_error_is_status_error() {
        let base = spawn_model_stub().await;
        let client = HttpPredictionClient::new(&base, Duration::from_secs(5)).unwrap();
        let err = client.predict(&payload("boom")).await.unwrap_err();
        assert!(matches!(err, PredictionError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            HttpPredictionClient::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let err = client.predict(&payload("p1")).await.unwrap_err();
        assert!(matches!(
            err,
            PredictionError::Connection(_) | PredictionError::HttpClient(_)
        ));
    }

    #[tokio::test]
    async fn mock_records_payloads() {
        let mock = MockPredictionClient::new(PredictionResponse::default());
        mock.predict(&payload("p1")).await.unwrap();
        assert_eq!(mock.received().len(), 1);
        assert_eq!(mock.received()[0].root_id(), Some("p1"));

        let failing = MockPredictionClient::failing(503, "down");
        assert!(failing.predict(&payload("p1")).await.is_err());
    }
}
