//! API error types and JSON error response formatting.
//!
//! Every failure leaves the proxy as a [`ChatErrorBody`], the shape the chat
//! client classifies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use voxline_chat::ErrorKind;
use voxline_core::error::VoxlineError;
use voxline_core::types::ChatErrorBody;

use crate::provider::UpstreamError;

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400 - missing or invalid request fields.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// 500 - the proxy is missing configuration it needs.
    #[error("not configured: {0}")]
    NotConfigured(String),
    /// Upstream failure, translated to a client-facing kind.
    #[error("upstream failure: {0}")]
    Upstream(ErrorKind),
    /// 500 - unexpected server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(kind) => status_for_kind(*kind),
            ApiError::NotConfigured(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ChatErrorBody {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotConfigured(msg) | ApiError::Internal(msg) => {
                ChatErrorBody {
                    error: msg.clone(),
                    ..ChatErrorBody::default()
                }
            }
            ApiError::Upstream(kind) => error_body(*kind),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        ApiError::Upstream(translate_upstream(&err))
    }
}

impl From<VoxlineError> for ApiError {
    fn from(err: VoxlineError) -> Self {
        match err {
            VoxlineError::Config(msg) => ApiError::NotConfigured(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Map an upstream failure onto the client-facing taxonomy.
pub fn translate_upstream(err: &UpstreamError) -> ErrorKind {
    match err {
        UpstreamError::Status { status: 429, message } => {
            let lower = message.to_lowercase();
            if lower.contains("quota") || lower.contains("billing") {
                ErrorKind::QuotaExceeded
            } else {
                ErrorKind::RateLimit
            }
        }
        UpstreamError::Status { status: 401, .. } => ErrorKind::AuthError,
        UpstreamError::Status { status: 503, .. } => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::UnknownError,
    }
}

pub fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::QuotaExceeded | ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::AuthError => StatusCode::UNAUTHORIZED,
        ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Offline | ErrorKind::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The error body for `kind`; `retryAfter` only when the kind has a delay.
pub fn error_body(kind: ErrorKind) -> ChatErrorBody {
    let retry_after = kind.default_retry_after_secs();
    ChatErrorBody {
        error: kind.default_message().to_string(),
        error_type: Some(kind.as_str().to_string()),
        retryable: Some(kind.is_retryable()),
        retry_after: (retry_after > 0).then_some(retry_after),
    }
}
