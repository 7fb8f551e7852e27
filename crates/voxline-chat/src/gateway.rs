//! Remote chat endpoint client and failure classification.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use voxline_core::config::ChatConfig;
use voxline_core::error::VoxlineError;
use voxline_core::types::{ChatErrorBody, ChatReply, ChatRequest, ConversationTurn};

use crate::error::{ChatError, ErrorKind};

/// Performs one exchange with the chat endpoint.
///
/// Implementations have no side effects beyond the request itself; retry
/// and state bookkeeping belong to the caller.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn call(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ChatError>;
}

/// Map a non-2xx status and its body to a [`ChatError`].
///
/// | status | kind |
/// |---|---|
/// | 429 with quota/billing wording | `quota_exceeded` |
/// | 429 otherwise | `rate_limit` |
/// | 401 | `auth_error` |
/// | 503 | `service_unavailable` |
/// | anything else | `unknown_error` |
///
/// The body's `error` text becomes the message when present, and its
/// `retryAfter` overrides the default delay for retryable kinds.
pub fn classify_failure(status: u16, body: &str) -> ChatError {
    let parsed = serde_json::from_str::<ChatErrorBody>(body).ok();

    let kind = match status {
        429 => {
            let lowered = body.to_lowercase();
            if lowered.contains("quota") || lowered.contains("billing") {
                ErrorKind::QuotaExceeded
            } else {
                ErrorKind::RateLimit
            }
        }
        401 => ErrorKind::AuthError,
        503 => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::UnknownError,
    };

    let message = parsed
        .as_ref()
        .map(|b| b.error.trim())
        .filter(|m| !m.is_empty())
        .map_or_else(|| kind.default_message().to_string(), str::to_string);

    let mut err = ChatError::new(kind, message);
    if err.retryable {
        if let Some(secs) = parsed.and_then(|b| b.retry_after) {
            err.retry_after_secs = secs;
        }
    }
    err
}

/// Failure for a request that never produced a response.
pub fn transport_failure(cause: &reqwest::Error) -> ChatError {
    warn!(error = %cause, "Chat request failed before a response arrived");
    ChatError::from_kind(ErrorKind::Offline)
}

/// [`ChatGateway`] speaking JSON over HTTP to the chat proxy.
#[derive(Debug, Clone)]
pub struct HttpChatGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatGateway {
    pub fn new(config: &ChatConfig) -> Result<Self, VoxlineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| VoxlineError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint_url.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    async fn call(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ChatError> {
        let request = ChatRequest {
            message: message.to_string(),
            conversation_history: history.to_vec(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_failure(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_failure(&e))?;

        if !status.is_success() {
            let err = classify_failure(status.as_u16(), &body);
            warn!(status = status.as_u16(), kind = %err.kind, "Chat endpoint returned an error");
            return Err(err);
        }

        let reply: ChatReply = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "Malformed chat response body");
            ChatError::new(
                ErrorKind::UnknownError,
                "Received a malformed response from the chat service.",
            )
        })?;

        debug!(
            model = reply.model.as_deref().unwrap_or("unknown"),
            chars = reply.response.len(),
            "Chat reply received"
        );
        Ok(reply.response)
    }
}

// =============================================================================
// Tests
// =============================================================================
