//! Route handler functions.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use voxline_core::types::{ChatReply, ChatRequest};

use crate::error::ApiError;
use crate::provider::{CompletionRequest, PromptMessage};
use crate::state::AppState;

/// Reply text used when the upstream returns no usable completion.
pub const EMPTY_COMPLETION_REPLY: &str = "Sorry, I could not generate a response.";

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// POST /api/chat - answer one user message with prior turns as context.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected chat request body: {}", rejection);
            return Err(ApiError::BadRequest("Message is required".to_string()));
        }
    };

    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }
    if !state.provider.is_configured() {
        return Err(ApiError::NotConfigured(
            "API key not configured".to_string(),
        ));
    }

    let request_id = Uuid::new_v4();
    let config = &state.config;
    let mut messages = Vec::with_capacity(request.conversation_history.len() + 2);
    messages.push(PromptMessage::new("system", config.system_prompt.as_str()));
    messages.extend(
        request
            .conversation_history
            .iter()
            .map(|turn| PromptMessage::new(turn.role.as_str(), turn.content.as_str())),
    );
    messages.push(PromptMessage::new("user", message));

    let completion_request = CompletionRequest {
        model: config.model.clone(),
        messages,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        stream: false,
    };

    info!(
        %request_id,
        history = request.conversation_history.len(),
        "Forwarding chat request upstream"
    );
    let completion = state
        .provider
        .complete(&completion_request)
        .await
        .map_err(|e| {
            warn!(%request_id, "Upstream failure: {}", e);
            ApiError::from(e)
        })?;

    let response = completion
        .content
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| EMPTY_COMPLETION_REPLY.to_string());

    Ok(Json(ChatReply {
        response,
        usage: completion.usage,
        model: completion.model,
        provider: Some(state.provider.name().to_string()),
    }))
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
