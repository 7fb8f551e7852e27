//! Conversation log with a bounded persisted tail.
//!
//! The in-memory sequence holds the whole session; only the most recent
//! `max_persisted_messages` are written to durable storage on each change.

use std::sync::Arc;

use tracing::{debug, warn};

use voxline_core::clock::Clock;
use voxline_core::config::ConversationConfig;
use voxline_core::types::{ConversationTurn, Message};
use voxline_storage::KvStore;

/// Storage key holding the serialized message tail.
pub const MESSAGES_KEY: &str = "messages";

/// Ordered, append-only message log.
pub struct ConversationStore {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    messages: Vec<Message>,
    max_persisted: usize,
}

impl ConversationStore {
    /// Open the store and restore the last persisted snapshot.
    pub fn open(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        config: &ConversationConfig,
    ) -> Self {
        let mut conversation = Self {
            store,
            clock,
            messages: Vec::new(),
            max_persisted: config.max_persisted_messages,
        };
        conversation.messages = conversation.load();
        debug!(
            messages = conversation.messages.len(),
            "Conversation restored"
        );
        conversation
    }

    /// Read the persisted snapshot. Missing or unreadable storage yields an
    /// empty sequence.
    pub fn load(&self) -> Vec<Message> {
        match self.store.get(MESSAGES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Discarding unreadable conversation snapshot");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load conversation snapshot");
                Vec::new()
            }
        }
    }

    /// Timestamp for the next message: now, but never earlier than the
    /// last message.
    pub fn stamp(&self) -> i64 {
        let now = self.clock.now_ms();
        self.messages
            .last()
            .map_or(now, |last| now.max(last.timestamp))
    }

    /// Append a message and persist the tail.
    ///
    /// Returns the message as stored, with its timestamp clamped to the
    /// previous message's.
    pub fn append(&mut self, mut message: Message) -> Message {
        if let Some(last) = self.messages.last() {
            message.timestamp = message.timestamp.max(last.timestamp);
        }
        self.messages.push(message.clone());
        self.persist();
        message
    }

    /// Remove the last message if it is exactly `expected`.
    ///
    /// Returns whether a message was removed.
    pub fn rollback_last(&mut self, expected: &Message) -> bool {
        if self.messages.last() != Some(expected) {
            return false;
        }
        self.messages.pop();
        self.persist();
        true
    }

    /// Empty the log and delete the persisted snapshot.
    pub fn clear(&mut self) {
        self.messages.clear();
        if let Err(e) = self.store.remove(MESSAGES_KEY) {
            warn!(error = %e, "Failed to delete conversation snapshot");
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `limit` messages as chat-endpoint history, oldest first.
    pub fn history(&self, limit: usize) -> Vec<ConversationTurn> {
        let start = self.messages.len().saturating_sub(limit);
        self.messages[start..].iter().map(Message::to_turn).collect()
    }

    fn persist(&self) {
        let start = self.messages.len().saturating_sub(self.max_persisted);
        let result = serde_json::to_string(&self.messages[start..])
            .map_err(voxline_core::VoxlineError::from)
            .and_then(|raw| self.store.set(MESSAGES_KEY, &raw));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist conversation; keeping in memory only");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
