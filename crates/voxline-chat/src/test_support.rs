//! Fakes shared by the unit tests in this crate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use voxline_core::error::VoxlineError;
use voxline_core::types::ConversationTurn;
use voxline_storage::KvStore;

use crate::error::ChatError;
use crate::gateway::ChatGateway;
use crate::retry::Timer;

/// Store whose every operation fails.
pub struct FailingKvStore;

impl KvStore for FailingKvStore {
    fn get(&self, _key: &str) -> Result<Option<String>, VoxlineError> {
        Err(VoxlineError::Storage("quota exceeded".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), VoxlineError> {
        Err(VoxlineError::Storage("quota exceeded".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), VoxlineError> {
        Err(VoxlineError::Storage("quota exceeded".to_string()))
    }
}

/// A call observed by [`ScriptedGateway`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub message: String,
    pub history: Vec<ConversationTurn>,
}

/// Gateway replaying queued outcomes in order.
///
/// Once the script runs dry every call answers `"default reply"`.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    outcomes: Arc<Mutex<VecDeque<Result<String, ChatError>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: Result<String, ChatError>) -> &Self {
        self.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatGateway for ScriptedGateway {
    async fn call(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ChatError> {
        self.calls.lock().unwrap().push(RecordedCall {
            message: message.to_string(),
            history: history.to_vec(),
        });
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("default reply".to_string()))
    }
}

/// Timer that returns immediately and records requested delays.
#[derive(Clone, Default)]
pub struct RecordingTimer {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Timer for RecordingTimer {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
    }
}
