//! Assistant relay endpoint.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ChatRequest, ChatResponse};
use crate::chat::{ChatMessage, ChatTranscript, FALLBACK_REPLY};

const MAX_MESSAGE_CHARS: usize = 2000;

/// `POST /api/chat`: one question, one answer. An unavailable assistant
/// answers with the fallback text and `answered: false`.
pub async fn send(
    State(ctx): State<ApiContext>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if req.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Message too long (max {MAX_MESSAGE_CHARS} chars)"
        )));
    }

    let mut transcript = ChatTranscript::new();
    let exchange = transcript
        .send(ctx.chat.as_ref(), &req.message)
        .await
        .ok_or_else(|| ApiError::BadRequest("Message cannot be empty".into()))?;
    let content = exchange.answer.as_deref().unwrap_or(FALLBACK_REPLY);

    Ok(Json(ChatResponse {
        answered: exchange.answered,
        message: ChatMessage::new("assistant", content),
    }))
}
