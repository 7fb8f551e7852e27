//! Upstream completion providers.
//!
//! The proxy talks to one OpenAI-compatible chat-completions endpoint.
//! [`CompletionProvider`] keeps the handler independent of the HTTP details.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use voxline_core::config::ProxyConfig;
use voxline_core::error::VoxlineError;

/// Upstream request timeout.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// One message in the upstream prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// A non-streaming completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

/// What the upstream returned on success.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// First choice's text, if any.
    pub content: Option<String>,
    pub usage: Option<serde_json::Value>,
    pub model: Option<String>,
}

/// An upstream call that did not produce a completion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

/// A chat-completions backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Name reported as `provider` in chat replies.
    fn name(&self) -> &str;

    /// Whether credentials are available.
    fn is_configured(&self) -> bool;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, UpstreamError>;
}

// =============================================================================
// OpenAI wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Pull the human-readable message out of an upstream error body.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Provider for OpenAI-compatible chat-completions endpoints.
pub struct OpenAiProvider {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl OpenAiProvider {
    /// Build a provider reading the key from the configured environment
    /// variable. A missing key is not an error here; requests are refused
    /// later with a configuration error.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, VoxlineError> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            warn!(var = %config.api_key_env, "Upstream API key not set");
        }
        Self::new(&config.upstream_url, api_key)
    }

    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, VoxlineError> {
        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|e| VoxlineError::Api(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, UpstreamError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: upstream_message(&body),
            });
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content);

        debug!(model = parsed.model.as_deref().unwrap_or("unknown"), "Upstream completion received");
        Ok(Completion {
            content,
            usage: parsed.usage,
            model: parsed.model,
        })
    }
}
