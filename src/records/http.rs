use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::header::ACCEPT;
use serde_json::Value;

use super::{RecordStore, RecordStoreError, RecordStoreProvider, RequestOptions};

const FHIR_JSON: &str = "application/fhir+json";

/// FHIR REST client for search queries against a server base URL.
#[derive(Clone)]
pub struct HttpRecordStore {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpRecordStore {
    pub fn new(
        base_url: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RecordStoreError> {
        let client = build_client(timeout)?;
        Ok(Self::with_client(client, base_url, access_token, timeout))
    }

    /// Reuse an existing connection pool.
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            client,
            timeout_secs: timeout.as_secs(),
        }
    }

    /// Relative queries resolve against the base. An absolute URL is only
    /// followed when it lies under the base.
    fn url_for(&self, query: &str) -> Result<String, RecordStoreError> {
        if query.contains("://") {
            let under_base = query
                .strip_prefix(self.base_url.as_str())
                .is_some_and(|rest| rest.starts_with('/'));
            return if under_base {
                Ok(query.to_string())
            } else {
                Err(RecordStoreError::ForeignUrl(query.to_string()))
            };
        }
        Ok(format!("{}/{}", self.base_url, query.trim_start_matches('/')))
    }

    async fn fetch(
        &self,
        query: &str,
        options: RequestOptions,
    ) -> Result<Vec<Value>, RecordStoreError> {
        let url = self.url_for(query)?;
        let mut request = self.client.get(&url).header(ACCEPT, FHIR_JSON);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                RecordStoreError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                RecordStoreError::Timeout(self.timeout_secs)
            } else {
                RecordStoreError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), query, "Record store request failed");
            return Err(RecordStoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RecordStoreError::Decode(e.to_string()))?;

        Ok(flatten_response(body, options))
    }
}

impl RecordStore for HttpRecordStore {
    fn request<'a>(
        &'a self,
        query: &'a str,
        options: RequestOptions,
    ) -> BoxFuture<'a, Result<Vec<Value>, RecordStoreError>> {
        self.fetch(query, options).boxed()
    }
}

/// Turn a response body into a resource list. With `flat`, a search Bundle
/// is unwrapped into its entry resources; `null` is always empty.
pub fn flatten_response(body: Value, options: RequestOptions) -> Vec<Value> {
    match body {
        Value::Null => Vec::new(),
        Value::Object(mut map) if options.flat && is_bundle(&map) => match map.remove("entry") {
            Some(Value::Array(entries)) => entries
                .into_iter()
                .filter_map(|entry| match entry {
                    Value::Object(mut entry) => entry.remove("resource"),
                    _ => None,
                })
                .filter(|resource| !resource.is_null())
                .collect(),
            _ => Vec::new(),
        },
        Value::Array(items) if options.flat => items,
        other => vec![other],
    }
}

fn is_bundle(map: &serde_json::Map<String, Value>) -> bool {
    map.get("resourceType").and_then(Value::as_str) == Some("Bundle")
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, RecordStoreError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RecordStoreError::HttpClient(e.to_string()))
}

/// Opens token-scoped `HttpRecordStore`s that share one connection pool.
pub struct HttpRecordStoreProvider {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpRecordStoreProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RecordStoreError> {
        Ok(Self {
            base_url: base_url.to_string(),
            client: build_client(timeout)?,
            timeout,
        })
    }
}

impl RecordStoreProvider for HttpRecordStoreProvider {
    fn open(&self, access_token: Option<&str>) -> Arc<dyn RecordStore> {
        Arc::new(HttpRecordStore::with_client(
            self.client.clone(),
            &self.base_url,
            access_token.map(str::to_string),
            self.timeout,
        ))
    }
}
