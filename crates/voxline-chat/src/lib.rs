//! Offline-resilient chat pipeline for Voxline.
//!
//! Turns a finalized user utterance into a delivered reply: looks up the
//! response cache, answers from canned replies when offline, calls the chat
//! endpoint otherwise, classifies failures, and applies the single
//! auto-retry policy. The speech collaborators plug in through
//! [`voice::SpeechSource`] and [`voice::SpeechSink`].

pub mod cache;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod network;
pub mod offline;
pub mod orchestrator;
pub mod retry;
pub mod voice;

#[cfg(test)]
mod test_support;

pub use cache::{fingerprint, CacheEntry, CacheStatus, ResponseCache};
pub use conversation::ConversationStore;
pub use error::{ChatError, ErrorKind};
pub use gateway::{ChatGateway, HttpChatGateway};
pub use network::NetworkMonitor;
pub use offline::OfflineResponder;
pub use orchestrator::{ChatOrchestrator, ChatStatus, Phase, Reply};
pub use retry::{ScheduledRetry, Timer, TokioTimer};
pub use voice::{PlaybackOutcome, SpeechSink, SpeechSource, Transcript, VoiceLoop};
