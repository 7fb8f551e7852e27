//! Automatic retry scheduling.
//!
//! A failed first attempt may produce one [`ScheduledRetry`]. Firing it
//! consumes the value and yields a plain `Result`, so there is no path from
//! a retry's failure to another automatic retry.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use voxline_core::types::ConversationTurn;

use crate::error::{ChatError, ErrorKind};
use crate::gateway::ChatGateway;

/// Delay source for scheduled work.
#[async_trait]
pub trait Timer: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// [`Timer`] backed by `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// One pending automatic retry: the delay and the request to replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRetry {
    delay: Duration,
    message: String,
    history: Vec<ConversationTurn>,
}

impl ScheduledRetry {
    /// Schedule the retry for a first-attempt failure.
    ///
    /// Only `rate_limit` errors qualify; the delay is
    /// `max(retry_after_secs, 1)` seconds.
    pub fn after_failure(
        err: &ChatError,
        message: &str,
        history: Vec<ConversationTurn>,
    ) -> Option<Self> {
        if err.kind != ErrorKind::RateLimit || !err.retryable {
            return None;
        }
        Some(Self {
            delay: err.retry_delay(),
            message: message.to_string(),
            history,
        })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Wait out the delay, then make the single retry attempt.
    pub async fn fire(
        self,
        timer: &dyn Timer,
        gateway: &dyn ChatGateway,
    ) -> Result<String, ChatError> {
        info!(delay = ?self.delay, "Automatic retry armed");
        timer.sleep(self.delay).await;
        gateway.call(&self.message, &self.history).await
    }
}
