//! Assistant relay: OpenAI-compatible chat completions behind a trait, plus
//! the transcript the chat page keeps.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Shown in place of an answer when the assistant call fails.
pub const FALLBACK_REPLY: &str = "Chatbot not available at this time, please try again later.";

pub const SYSTEM_PROMPT: &str = "\
You are HerediCheck, an assistant for hereditary health, genetics and healthcare guidance. \
Give accurate, research-backed information about genetic conditions, hereditary risk and DNA testing.

Guidelines:
- Be friendly, clear and professional.
- Explain risks and mechanisms but never give a medical diagnosis.
- If a question is outside heredity, healthcare or genetics, politely steer the user back on topic.
- Where appropriate, recommend consulting a healthcare professional or genetic counselor.
- Structure longer answers with headings or bullet points.";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Assistant is not reachable at {0}")]
    Connection(String),

    #[error("Assistant request timed out after {0}s")]
    Timeout(u64),

    #[error("Assistant returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Assistant returned no completion")]
    EmptyCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// First completion choice: `{ "message": { "role", "content" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: ChatMessage,
}

pub trait ChatService: Send + Sync {
    fn chat<'a>(&'a self, message: &'a str) -> BoxFuture<'a, Result<ChatReply, ChatError>>;
}

// ═══════════════════════════════════════════════════════════
// HTTP client
// ═══════════════════════════════════════════════════════════

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<ChatReply>,
}

#[derive(Clone)]
pub struct HttpChatClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpChatClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    async fn complete(&self, message: &str) -> Result<ChatReply, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::new("system", SYSTEM_PROMPT),
                ChatMessage::new("user", message),
            ],
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ChatError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                ChatError::Timeout(self.timeout_secs)
            } else {
                ChatError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Assistant request failed");
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::HttpClient(e.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .ok_or(ChatError::EmptyCompletion)
    }
}

impl ChatService for HttpChatClient {
    fn chat<'a>(&'a self, message: &'a str) -> BoxFuture<'a, Result<ChatReply, ChatError>> {
        self.complete(message).boxed()
    }
}

/// Mock assistant for testing. `None` simulates an outage.
pub struct MockChatClient {
    reply: Option<String>,
}

impl MockChatClient {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
        }
    }

    pub fn unavailable() -> Self {
        Self { reply: None }
    }
}

impl ChatService for MockChatClient {
    fn chat<'a>(&'a self, _message: &'a str) -> BoxFuture<'a, Result<ChatReply, ChatError>> {
        let result = match &self.reply {
            Some(content) => Ok(ChatReply {
                message: ChatMessage::new("assistant", content),
            }),
            None => Err(ChatError::Connection("mock".into())),
        };
        futures_util::future::ready(result).boxed()
    }
}

// ═══════════════════════════════════════════════════════════
// Transcript
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatExchange {
    pub id: Uuid,
    pub question: String,
    /// `None` while the reply is pending.
    pub answer: Option<String>,
    /// Set when `answer` came from the assistant rather than the fallback.
    pub answered: bool,
    pub asked_at: DateTime<Utc>,
}

impl ChatExchange {
    pub fn is_pending(&self) -> bool {
        self.answer.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatTranscript {
    exchanges: Vec<ChatExchange>,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exchanges(&self) -> &[ChatExchange] {
        &self.exchanges
    }

    /// Record a pending exchange. Blank input is ignored.
    pub fn ask(&mut self, input: &str) -> Option<Uuid> {
        let question = input.trim();
        if question.is_empty() {
            return None;
        }
        let id = Uuid::new_v4();
        self.exchanges.push(ChatExchange {
            id,
            question: question.to_string(),
            answer: None,
            answered: false,
            asked_at: Utc::now(),
        });
        Some(id)
    }

    /// Fill a pending exchange with the reply, or with the fallback text.
    pub fn resolve(&mut self, id: Uuid, outcome: Result<ChatReply, ChatError>) {
        let Some(exchange) = self.exchanges.iter_mut().find(|e| e.id == id) else {
            return;
        };
        exchange.answered = outcome.is_ok();
        exchange.answer = Some(match outcome {
            Ok(reply) => reply.message.content,
            Err(e) => {
                tracing::warn!(error = %e, "Assistant unavailable");
                FALLBACK_REPLY.to_string()
            }
        });
    }

    /// Ask and wait for the answer.
    pub async fn send(&mut self, service: &dyn ChatService, input: &str) -> Option<&ChatExchange> {
        let id = self.ask(input)?;
        let question = self.exchanges.last().map(|e| e.question.clone())?;
        let outcome = service.chat(&question).await;
        self.resolve(id, outcome);
        self.exchanges.iter().find(|e| e.id == id)
    }
}
