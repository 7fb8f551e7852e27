//! Chat orchestrator: one exchange at a time through cache, offline
//! responder, gateway and retry policy.
//!
//! The orchestrator owns the conversation and the cache. Status changes are
//! published as [`ChatStatus`] snapshots on a watch channel so front ends can
//! render errors and retry progress without borrowing the orchestrator.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use voxline_core::config::ChatConfig;
use voxline_core::types::{Message, Provenance, Role};

use crate::cache::{CacheStatus, ResponseCache};
use crate::conversation::ConversationStore;
use crate::error::{ChatError, ErrorKind};
use crate::gateway::ChatGateway;
use crate::network::NetworkMonitor;
use crate::offline::OfflineResponder;
use crate::retry::{ScheduledRetry, Timer, TokioTimer};

/// Where the orchestrator is in the current exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Sending,
    RetryPending,
    Settled,
}

/// Snapshot of the failure surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatStatus {
    pub phase: Phase,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub retryable: bool,
    pub is_retrying: bool,
    pub is_online: bool,
}

/// The assistant text produced by an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub provenance: Provenance,
}

/// Coordinates a single conversation.
pub struct ChatOrchestrator {
    cache: ResponseCache,
    conversation: ConversationStore,
    offline: OfflineResponder,
    network: NetworkMonitor,
    gateway: Arc<dyn ChatGateway>,
    timer: Arc<dyn Timer>,
    status: watch::Sender<ChatStatus>,
    last_user_text: Option<String>,
    /// The last `send` failed and its user message was removed.
    rolled_back: bool,
    max_history: usize,
}

impl ChatOrchestrator {
    /// Wire an orchestrator from its collaborators.
    ///
    /// A restored conversation ending in a user message means the previous
    /// session stopped mid-exchange; that text becomes the retry target.
    pub fn new(
        config: &ChatConfig,
        cache: ResponseCache,
        conversation: ConversationStore,
        offline: OfflineResponder,
        network: NetworkMonitor,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        let last_user_text = conversation
            .last()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.clone());
        let (status, _) = watch::channel(ChatStatus {
            is_online: network.is_online(),
            ..ChatStatus::default()
        });

        Self {
            cache,
            conversation,
            offline,
            network,
            gateway,
            timer: Arc::new(TokioTimer),
            status,
            last_user_text,
            rolled_back: false,
            max_history: config.max_history_messages,
        }
    }

    /// Replace the timer used for automatic retry delays.
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    /// Submit user text and settle the exchange.
    ///
    /// Returns `Ok(None)` for blank input. On failure the optimistic user
    /// message is rolled back and the error is both published and returned.
    pub async fn send(&mut self, user_text: &str) -> Result<Option<Reply>, ChatError> {
        let text = user_text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        self.begin(false);
        self.last_user_text = Some(text.to_string());
        self.rolled_back = false;

        let history = self.conversation.history(self.max_history);
        let stamp = self.conversation.stamp();
        let user_message = self.conversation.append(Message::user(text, stamp));

        let online = self.network.is_online();
        if online {
            if let Some(cached) = self.cache.lookup(text) {
                info!("Answered from response cache");
                return Ok(Some(self.settle(cached, Provenance::Cached)));
            }
        } else {
            info!("Offline; answering from keyword rules");
            let answer = self.offline.answer(text);
            return Ok(Some(self.settle(answer, Provenance::Offline)));
        }

        let outcome = match self.gateway.call(text, &history).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                warn!(kind = %err.kind, "Chat request failed: {}", err.message);
                match ScheduledRetry::after_failure(&err, text, history) {
                    Some(retry) => {
                        self.publish(|s| {
                            s.phase = Phase::RetryPending;
                            s.is_retrying = true;
                            record_error(s, &err);
                        });
                        retry
                            .fire(self.timer.as_ref(), self.gateway.as_ref())
                            .await
                    }
                    None => Err(err),
                }
            }
        };

        match outcome {
            Ok(reply) => {
                self.cache.store(text, &reply);
                Ok(Some(self.settle(reply, Provenance::Live)))
            }
            Err(err) => {
                if self.conversation.rollback_last(&user_message) {
                    self.rolled_back = true;
                } else {
                    debug!("Optimistic user message was no longer last; nothing rolled back");
                }
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Re-issue the last submitted user text to the gateway.
    ///
    /// The user message is re-appended only when the failed `send` rolled it
    /// back. A restored unanswered user message, or an exchange that was
    /// already answered, only gains a new assistant message. Failures are
    /// surfaced without rollback and never schedule an automatic retry.
    pub async fn retry_last_message(&mut self) -> Result<Option<Reply>, ChatError> {
        let Some(text) = self.last_user_text.clone() else {
            debug!("Retry requested with no prior message");
            return Ok(None);
        };

        self.begin(true);

        let pending = !self.rolled_back
            && self
                .conversation
                .last()
                .is_some_and(|m| m.role == Role::User && m.content == text);
        let mut history = self
            .conversation
            .history(self.max_history + usize::from(pending));
        if pending {
            history.pop();
        }

        info!(pending, rolled_back = self.rolled_back, "Retrying last message");
        match self.gateway.call(&text, &history).await {
            Ok(reply) => {
                self.cache.store(&text, &reply);
                if self.rolled_back {
                    let stamp = self.conversation.stamp();
                    self.conversation.append(Message::user(text.as_str(), stamp));
                    self.rolled_back = false;
                }
                Ok(Some(self.settle(reply, Provenance::Live)))
            }
            Err(err) => {
                warn!(kind = %err.kind, "Retry failed: {}", err.message);
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Clear the conversation and the failure surface. The cache is kept.
    pub fn clear_chat(&mut self) {
        self.conversation.clear();
        self.last_user_text = None;
        self.rolled_back = false;
        self.reset_status();
        info!("Conversation cleared");
    }

    /// Clear the response cache together with the conversation.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.conversation.clear();
        self.last_user_text = None;
        self.rolled_back = false;
        self.reset_status();
        info!("Response cache and conversation cleared");
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.cache.status()
    }

    /// Current status snapshot.
    pub fn status(&self) -> ChatStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ChatStatus> {
        self.status.subscribe()
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn last_user_text(&self) -> Option<&str> {
        self.last_user_text.as_deref()
    }

    fn begin(&self, is_retrying: bool) {
        let is_online = self.network.is_online();
        self.publish(|s| {
            *s = ChatStatus {
                phase: Phase::Sending,
                is_retrying,
                is_online,
                ..ChatStatus::default()
            };
        });
    }

    fn settle(&mut self, text: String, provenance: Provenance) -> Reply {
        let stamp = self.conversation.stamp();
        self.conversation
            .append(Message::assistant(text.as_str(), stamp, provenance));
        self.publish(|s| {
            s.phase = Phase::Settled;
            s.is_retrying = false;
            s.error = None;
            s.error_kind = None;
            s.retryable = false;
        });
        Reply { text, provenance }
    }

    fn fail(&self, err: &ChatError) {
        self.publish(|s| {
            s.phase = Phase::Settled;
            s.is_retrying = false;
            record_error(s, err);
        });
    }

    fn reset_status(&self) {
        let is_online = self.network.is_online();
        self.publish(|s| {
            *s = ChatStatus {
                is_online,
                ..ChatStatus::default()
            };
        });
    }

    fn publish(&self, update: impl FnOnce(&mut ChatStatus)) {
        self.status.send_modify(update);
    }
}

fn record_error(status: &mut ChatStatus, err: &ChatError) {
    status.error = Some(err.message.clone());
    status.error_kind = Some(err.kind);
    status.retryable = err.retryable;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use voxline_core::clock::{Clock, ManualClock};
    use voxline_core::config::{CacheConfig, ConversationConfig};
    use voxline_storage::{KvStore, MemoryKvStore};

    use super::*;
    use crate::test_support::{FailingKvStore, RecordingTimer, ScriptedGateway};

    struct Harness {
        store: Arc<dyn KvStore>,
        clock: Arc<ManualClock>,
        gateway: ScriptedGateway,
        timer: RecordingTimer,
        network: NetworkMonitor,
    }

    impl Harness {
        fn new(online: bool) -> Self {
            Self {
                store: Arc::new(MemoryKvStore::new()),
                clock: Arc::new(ManualClock::new(1_700_000_000_000)),
                gateway: ScriptedGateway::new(),
                timer: RecordingTimer::new(),
                network: NetworkMonitor::new(online),
            }
        }

        fn cache(&self) -> ResponseCache {
            let clock: Arc<dyn Clock> = self.clock.clone();
            ResponseCache::open(self.store.clone(), clock, &CacheConfig::default())
        }

        fn orchestrator(&self) -> ChatOrchestrator {
            let clock: Arc<dyn Clock> = self.clock.clone();
            let conversation = ConversationStore::open(
                self.store.clone(),
                clock.clone(),
                &ConversationConfig::default(),
            );
            ChatOrchestrator::new(
                &ChatConfig::default(),
                self.cache(),
                conversation,
                OfflineResponder::new(clock),
                self.network.clone(),
                Arc::new(self.gateway.clone()),
            )
            .with_timer(Arc::new(self.timer.clone()))
        }
    }

    fn rate_limited(secs: u64) -> ChatError {
        let mut err = ChatError::from_kind(ErrorKind::RateLimit);
        err.retry_after_secs = secs;
        err
    }

    #[tokio::test]
    async fn test_blank_input_is_a_no_op() {
        let h = Harness::new(true);
        let mut chat = h.orchestrator();

        assert_eq!(chat.send("").await.unwrap(), None);
        assert_eq!(chat.send("   \n").await.unwrap(), None);
        assert!(chat.messages().is_empty());
        assert_eq!(h.gateway.call_count(), 0);
        assert_eq!(chat.status().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_offline_uses_keyword_rules() {
        let h = Harness::new(false);
        let mut chat = h.orchestrator();

        let reply = chat.send("hello").await.unwrap().unwrap();
        assert_eq!(reply.provenance, Provenance::Offline);

        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].provenance, Provenance::Offline);
        assert_eq!(h.gateway.call_count(), 0);
        assert_eq!(chat.cache_status().entries, 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let h = Harness::new(true);
        h.cache().store("What is Rust?", "A systems language.");
        let mut chat = h.orchestrator();

        let reply = chat.send("  what is rust?  ").await.unwrap().unwrap();
        assert_eq!(reply.text, "A systems language.");
        assert_eq!(reply.provenance, Provenance::Cached);
        assert_eq!(chat.messages()[1].provenance, Provenance::Cached);
        assert_eq!(h.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_live_reply_is_cached_and_history_excludes_current_turn() {
        let h = Harness::new(true);
        h.gateway.push(Ok("first".to_string()));
        h.gateway.push(Ok("second".to_string()));
        let mut chat = h.orchestrator();

        let reply = chat.send("one").await.unwrap().unwrap();
        assert_eq!(reply.provenance, Provenance::Live);
        assert_eq!(chat.cache_status().entries, 1);

        chat.send("two").await.unwrap();
        let calls = h.gateway.calls();
        assert!(calls[0].history.is_empty());
        assert_eq!(calls[1].message, "two");
        assert_eq!(calls[1].history.len(), 2);
        assert_eq!(calls[1].history[0].content, "one");
        assert_eq!(calls[1].history[1].content, "first");
    }

    #[tokio::test]
    async fn test_quota_failure_rolls_back_without_retry() {
        let h = Harness::new(true);
        h.gateway
            .push(Err(ChatError::from_kind(ErrorKind::QuotaExceeded)));
        let mut chat = h.orchestrator();

        let err = chat.send("hello there").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::QuotaExceeded);
        assert!(chat.messages().is_empty());
        assert!(h.timer.delays().is_empty());
        assert_eq!(h.gateway.call_count(), 1);

        let status = chat.status();
        assert_eq!(status.error_kind, Some(ErrorKind::QuotaExceeded));
        assert!(!status.retryable);
        assert!(!status.is_retrying);
    }

    #[tokio::test]
    async fn test_service_unavailable_is_retryable_but_not_automatic() {
        let h = Harness::new(true);
        h.gateway
            .push(Err(ChatError::from_kind(ErrorKind::ServiceUnavailable)));
        let mut chat = h.orchestrator();

        chat.send("status?").await.unwrap_err();
        assert!(chat.messages().is_empty());
        assert!(h.timer.delays().is_empty());
        assert!(chat.status().retryable);
    }

    #[tokio::test]
    async fn test_rate_limit_retries_once_and_succeeds() {
        let h = Harness::new(true);
        h.gateway.push(Err(rate_limited(0)));
        h.gateway.push(Ok("after wait".to_string()));
        let mut chat = h.orchestrator();

        let reply = chat.send("busy?").await.unwrap().unwrap();
        assert_eq!(reply.text, "after wait");
        assert_eq!(h.gateway.call_count(), 2);
        assert_eq!(h.timer.delays(), vec![Duration::from_secs(1)]);

        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "after wait");

        let status = chat.status();
        assert_eq!(status.error, None);
        assert!(!status.is_retrying);
        assert_eq!(status.phase, Phase::Settled);
    }

    #[tokio::test]
    async fn test_failed_automatic_retry_is_not_retried_again() {
        let h = Harness::new(true);
        h.gateway.push(Err(rate_limited(20)));
        h.gateway.push(Err(rate_limited(20)));
        h.gateway.push(Ok("never reached".to_string()));
        let mut chat = h.orchestrator();

        let err = chat.send("busy?").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(h.gateway.call_count(), 2);
        assert_eq!(h.timer.delays(), vec![Duration::from_secs(20)]);
        assert!(chat.messages().is_empty());
        assert!(!chat.status().is_retrying);
    }

    struct ObservingTimer {
        status: watch::Receiver<ChatStatus>,
        seen: Mutex<Option<ChatStatus>>,
    }

    #[async_trait]
    impl Timer for ObservingTimer {
        async fn sleep(&self, _delay: Duration) {
            *self.seen.lock().unwrap() = Some(self.status.borrow().clone());
        }
    }

    #[tokio::test]
    async fn test_status_reports_pending_retry() {
        let h = Harness::new(true);
        h.gateway.push(Err(rate_limited(3)));
        let chat = h.orchestrator();
        let observer = Arc::new(ObservingTimer {
            status: chat.subscribe_status(),
            seen: Mutex::new(None),
        });
        let mut chat = chat.with_timer(observer.clone());

        chat.send("busy?").await.unwrap();

        let seen = observer.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.phase, Phase::RetryPending);
        assert!(seen.is_retrying);
        assert_eq!(seen.error_kind, Some(ErrorKind::RateLimit));
        assert!(chat.status().error.is_none());
    }

    #[tokio::test]
    async fn test_error_cleared_on_next_send() {
        let h = Harness::new(true);
        h.gateway.push(Err(ChatError::from_kind(ErrorKind::AuthError)));
        let mut chat = h.orchestrator();

        chat.send("first").await.unwrap_err();
        assert!(chat.status().error.is_some());

        h.network.set_online(false);
        chat.send("hello").await.unwrap();
        let status = chat.status();
        assert!(status.error.is_none());
        assert!(!status.is_online);
    }

    #[tokio::test]
    async fn test_retry_after_rollback_restores_pair() {
        let h = Harness::new(true);
        h.gateway
            .push(Err(ChatError::from_kind(ErrorKind::ServiceUnavailable)));
        h.gateway.push(Ok("recovered".to_string()));
        let mut chat = h.orchestrator();

        chat.send("ping").await.unwrap_err();
        assert!(chat.messages().is_empty());

        let reply = chat.retry_last_message().await.unwrap().unwrap();
        assert_eq!(reply.text, "recovered");
        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "ping");
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].content, "recovered");
        assert!(messages[0].timestamp <= messages[1].timestamp);
    }

    #[tokio::test]
    async fn test_retry_after_answered_exchange_adds_only_assistant() {
        let h = Harness::new(true);
        h.gateway.push(Ok("answer".to_string()));
        h.gateway.push(Ok("again".to_string()));
        let mut chat = h.orchestrator();

        chat.send("question").await.unwrap();
        let reply = chat.retry_last_message().await.unwrap().unwrap();
        assert_eq!(reply.text, "again");

        let turns: Vec<(Role, &str)> = chat
            .messages()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            turns,
            vec![
                (Role::User, "question"),
                (Role::Assistant, "answer"),
                (Role::Assistant, "again"),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_retry_after_rollback_does_not_duplicate_user() {
        let h = Harness::new(true);
        h.gateway
            .push(Err(ChatError::from_kind(ErrorKind::ServiceUnavailable)));
        h.gateway
            .push(Err(ChatError::from_kind(ErrorKind::ServiceUnavailable)));
        h.gateway.push(Ok("third time".to_string()));
        h.gateway.push(Ok("fourth time".to_string()));
        let mut chat = h.orchestrator();

        chat.send("ping").await.unwrap_err();
        chat.retry_last_message().await.unwrap_err();
        assert!(chat.messages().is_empty());

        chat.retry_last_message().await.unwrap();
        chat.retry_last_message().await.unwrap();
        let users = chat
            .messages()
            .iter()
            .filter(|m| m.role == Role::User)
            .count();
        assert_eq!(users, 1);
        assert_eq!(chat.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_of_interrupted_exchange_appends_only_assistant() {
        let h = Harness::new(true);
        {
            let clock: Arc<dyn Clock> = h.clock.clone();
            let mut conversation =
                ConversationStore::open(h.store.clone(), clock, &ConversationConfig::default());
            conversation.append(Message::user("earlier", 1));
            conversation.append(Message::assistant("earlier reply", 2, Provenance::Live));
            conversation.append(Message::user("unanswered", 3));
        }

        let mut chat = h.orchestrator();
        assert_eq!(chat.last_user_text(), Some("unanswered"));

        chat.retry_last_message().await.unwrap();
        let messages = chat.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].content, "unanswered");
        assert_eq!(messages[3].role, Role::Assistant);

        let calls = h.gateway.calls();
        assert_eq!(calls[0].message, "unanswered");
        assert_eq!(calls[0].history.len(), 2);
    }

    #[tokio::test]
    async fn test_retry_failure_keeps_messages_and_skips_auto_retry() {
        let h = Harness::new(true);
        h.gateway.push(Ok("answer".to_string()));
        h.gateway.push(Err(rate_limited(5)));
        let mut chat = h.orchestrator();

        chat.send("question").await.unwrap();
        let err = chat.retry_last_message().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(chat.messages().len(), 2);
        assert!(h.timer.delays().is_empty());
        assert_eq!(chat.status().error_kind, Some(ErrorKind::RateLimit));
    }

    #[tokio::test]
    async fn test_retry_without_prior_message() {
        let h = Harness::new(true);
        let mut chat = h.orchestrator();

        assert_eq!(chat.retry_last_message().await.unwrap(), None);
        assert_eq!(h.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_chat_keeps_cache() {
        let h = Harness::new(true);
        h.gateway.push(Ok("cached later".to_string()));
        let mut chat = h.orchestrator();

        chat.send("remember me").await.unwrap();
        chat.clear_chat();
        assert!(chat.messages().is_empty());
        assert_eq!(chat.status(), ChatStatus { is_online: true, ..ChatStatus::default() });
        assert_eq!(chat.retry_last_message().await.unwrap(), None);

        let reply = chat.send("remember me").await.unwrap().unwrap();
        assert_eq!(reply.provenance, Provenance::Cached);
        assert_eq!(h.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_cache_clears_both() {
        let h = Harness::new(true);
        let mut chat = h.orchestrator();

        chat.send("question").await.unwrap();
        chat.clear_cache();
        assert!(chat.messages().is_empty());
        assert_eq!(chat.cache_status().entries, 0);
        assert!(h.cache().lookup("question").is_none());

        chat.send("question").await.unwrap();
        assert_eq!(h.gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn test_conversation_survives_restart() {
        let h = Harness::new(true);
        {
            let mut chat = h.orchestrator();
            chat.send("one").await.unwrap();
            h.clock.advance(Duration::from_secs(5));
            chat.send("two").await.unwrap();
        }

        let chat = h.orchestrator();
        let contents: Vec<&str> = chat.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "default reply", "two", "default reply"]);
        assert_eq!(chat.last_user_text(), None);
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_interrupt_chat() {
        let mut h = Harness::new(true);
        h.store = Arc::new(FailingKvStore);
        h.gateway.push(Ok("still here".to_string()));
        let mut chat = h.orchestrator();

        let reply = chat.send("anyone?").await.unwrap().unwrap();
        assert_eq!(reply.text, "still here");
        assert_eq!(chat.messages().len(), 2);

        let again = chat.send("anyone?").await.unwrap().unwrap();
        assert_eq!(again.provenance, Provenance::Cached);
        assert!(chat.status().error.is_none());
    }
}
