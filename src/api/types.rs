//! Shared state and request/response bodies of the HTTP API.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, ChatService, HttpChatClient};
use crate::collector::form::ValidPersonalInfo;
use crate::collector::{AssessmentDraft, ConditionSelection, PersonalInfo};
use crate::config::AppConfig;
use crate::models::SiblingKind;
use crate::prediction::{HttpPredictionClient, PredictionReport, PredictionService};
use crate::records::{HttpRecordStoreProvider, RecordStoreProvider};
use crate::wizard::WizardStep;

use super::server::ServerError;

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes: configuration plus the three
/// external services.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<AppConfig>,
    pub predictor: Arc<dyn PredictionService>,
    pub chat: Arc<dyn ChatService>,
    pub records: Arc<dyn RecordStoreProvider>,
}

impl ApiContext {
    pub fn new(
        config: AppConfig,
        predictor: Arc<dyn PredictionService>,
        chat: Arc<dyn ChatService>,
        records: Arc<dyn RecordStoreProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            predictor,
            chat,
            records,
        }
    }

    /// HTTP clients for every service, sharing the configured timeout.
    pub fn from_config(config: AppConfig) -> Result<Self, ServerError> {
        let timeout = config.request_timeout();
        let predictor = HttpPredictionClient::new(&config.prediction_url, timeout)
            .map_err(|e| ServerError::Client(e.to_string()))?;
        let chat = HttpChatClient::new(
            &config.chat_url,
            &config.chat_model,
            config.chat_api_key.clone(),
            timeout,
        )
        .map_err(|e| ServerError::Client(e.to_string()))?;
        let records = HttpRecordStoreProvider::new(&config.fhir_base_url, timeout)
            .map_err(|e| ServerError::Client(e.to_string()))?;

        Ok(Self::new(
            config,
            Arc::new(predictor),
            Arc::new(chat),
            Arc::new(records),
        ))
    }
}

// ═══════════════════════════════════════════════════════════
// Assessment
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct SiblingRequest {
    pub kind: SiblingKind,
    #[serde(default)]
    pub conditions: Vec<String>,
}

/// Full wizard input in one body. Condition lists go through the same
/// checklist rules as the form, so `"None of the above"` clears a list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssessmentRequest {
    pub personal_info: PersonalInfo,
    pub conditions: Vec<String>,
    pub father: Vec<String>,
    pub mother: Vec<String>,
    pub siblings: Vec<SiblingRequest>,
}

fn selection(labels: &[String]) -> ConditionSelection {
    labels.iter().map(String::as_str).collect()
}

impl AssessmentRequest {
    pub fn apply_to(&self, draft: &mut AssessmentDraft) {
        draft.personal_info = self.personal_info.clone();
        draft.own = selection(&self.conditions);
        draft.father = selection(&self.father);
        draft.mother = selection(&self.mother);
        for sibling in &self.siblings {
            let mut form = draft.open_sibling_form(sibling.kind);
            form.selection = selection(&sibling.conditions);
            draft.confirm_sibling(form);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResponse {
    pub step: WizardStep,
    pub personal_info: Option<ValidPersonalInfo>,
    pub report: PredictionReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionCatalogue {
    pub conditions: Vec<&'static str>,
    pub none_option: &'static str,
}

// ═══════════════════════════════════════════════════════════
// Records & chat
// ═══════════════════════════════════════════════════════════

/// Optional session details for record-driven routes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionQuery {
    pub fhir_user: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub answered: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_applies_checklist_rules() {
        let request: AssessmentRequest = serde_json::from_value(json!({
            "personalInfo": { "age": "40", "gender": "female" },
            "conditions": ["Diabetes", "None of the above"],
            "father": ["Cancer", "Cancer"],
            "siblings": [
                { "kind": "brother", "conditions": ["Asthma"] },
                { "kind": "sister" }
            ]
        }))
        .unwrap();

        let mut draft = AssessmentDraft::new();
        request.apply_to(&mut draft);

        assert!(draft.own.conditions().is_empty());
        assert!(draft.own.is_none_selected());
        assert_eq!(draft.father.conditions().join(), "Cancer");
        assert!(draft.mother.conditions().is_empty());
        assert_eq!(draft.siblings().len(), 2);
        assert_eq!(draft.personal_info.age, "40");
    }
}
