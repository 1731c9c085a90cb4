//! Axum route handlers for the career-assistant chat.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::chat::history::prepare_history;
use crate::errors::AppError;
use crate::llm_client::{ChatMessage, ChatRequest, LlmError, Usage};
use crate::state::AppState;

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1024;
const MAX_TOKENS_LIMIT: u32 = 4096;

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub content: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// POST /api/v1/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatReply>, AppError> {
    if !state.llm.is_configured() {
        return Err(LlmError::NotConfigured.into());
    }

    let messages = prepare_history(body.messages, state.config.chat_max_messages)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let model = body
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.chat_model.clone());
    let request = ChatRequest {
        model: &model,
        messages: &messages,
        temperature: body.temperature.unwrap_or(DEFAULT_TEMPERATURE).clamp(0.0, 2.0),
        max_tokens: body
            .max_tokens
            .unwrap_or(DEFAULT_MAX_TOKENS)
            .clamp(1, MAX_TOKENS_LIMIT),
    };

    let request_id = Uuid::new_v4();
    let cancel = state.shutdown.child_token();
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LlmError::Cancelled),
        response = state.llm.call(&request) => response,
    }?;

    let content = response
        .text()
        .ok_or_else(|| LlmError::BadResponse("empty completion".to_string()))?
        .to_string();

    info!(
        "chat {request_id}: {} message(s) answered by {}",
        messages.len(),
        model
    );
    Ok(Json(ChatReply {
        content,
        model: response.model.unwrap_or(model),
        usage: response.usage,
    }))
}
