//! Error types for the chat pipeline.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Classification of a failed exchange with the chat endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    QuotaExceeded,
    RateLimit,
    AuthError,
    ServiceUnavailable,
    Offline,
    UnknownError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::AuthError => "auth_error",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Offline => "offline",
            ErrorKind::UnknownError => "unknown_error",
        }
    }

    /// Whether a later attempt can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimit | ErrorKind::ServiceUnavailable | ErrorKind::Offline
        )
    }

    /// Suggested wait before retrying, in seconds.
    pub fn default_retry_after_secs(&self) -> u64 {
        match self {
            ErrorKind::RateLimit => 20,
            ErrorKind::ServiceUnavailable => 30,
            ErrorKind::Offline => 2,
            _ => 0,
        }
    }

    /// Message shown when the endpoint did not provide one.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::QuotaExceeded => {
                "API quota exceeded. Please check your billing and usage limits."
            }
            ErrorKind::RateLimit => "Too many requests. Please wait a moment and try again.",
            ErrorKind::AuthError => "Invalid API key. Please check your configuration.",
            ErrorKind::ServiceUnavailable => {
                "The chat service is temporarily unavailable. Please try again in a moment."
            }
            ErrorKind::Offline => "Unable to reach the chat service. Check your connection.",
            ErrorKind::UnknownError => "Failed to get AI response. Please try again.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed exchange, as surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ChatError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    pub retry_after_secs: u64,
}

impl ChatError {
    /// Build an error with the table defaults for `kind`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_retryable(),
            retry_after_secs: kind.default_retry_after_secs(),
        }
    }

    /// Build an error carrying the kind's default message.
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    /// Delay before the automatic retry: at least one second.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_after_secs.max(1))
    }
}
