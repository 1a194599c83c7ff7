use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;

use super::{RecordStore, RecordStoreError, RequestOptions};

/// In-memory record store keyed by exact query string.
///
/// Unknown queries answer with an empty list. Used by tests and by demo
/// deployments without a FHIR server.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    responses: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    failures: Arc<Mutex<HashSet<String>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(self, query: &str, records: Vec<Value>) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(query.to_string(), records);
        }
        self
    }

    /// Make `query` fail with a transport error.
    pub fn with_failure(self, query: &str) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(query.to_string());
        }
        self
    }

    /// Delay the answer to `query`.
    pub fn with_delay(self, query: &str, delay: Duration) -> Self {
        if let Ok(mut delays) = self.delays.lock() {
            delays.insert(query.to_string(), delay);
        }
        self
    }

    /// Queries received so far, in arrival order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn request<'a>(
        &'a self,
        query: &'a str,
        _options: RequestOptions,
    ) -> BoxFuture<'a, Result<Vec<Value>, RecordStoreError>> {
        async move {
            if let Ok(mut requested) = self.requested.lock() {
                requested.push(query.to_string());
            }

            let delay = self.delays.lock().ok().and_then(|d| d.get(query).copied());
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let failing = self
                .failures
                .lock()
                .map(|f| f.contains(query))
                .unwrap_or(false);
            if failing {
                return Err(RecordStoreError::Connection("in-memory".into()));
            }

            Ok(self
                .responses
                .lock()
                .ok()
                .and_then(|r| r.get(query).cloned())
                .unwrap_or_default())
        }
        .boxed()
    }
}
