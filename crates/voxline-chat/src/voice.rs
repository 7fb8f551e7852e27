//! Speech collaborators and the loop that drives the orchestrator from them.
//!
//! Recognition and synthesis live behind [`SpeechSource`] and [`SpeechSink`];
//! this crate only decides what to do with finalized text.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use voxline_core::error::VoxlineError;

use crate::orchestrator::{ChatOrchestrator, Reply};

/// A finalized recognition result.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    /// Recognizer confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Transcript {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    /// Text entered directly rather than recognized.
    pub fn typed(text: impl Into<String>) -> Self {
        Self::new(text, 1.0)
    }
}

/// How a playback request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Interrupted,
}

/// Produces finalized utterances. `Ok(None)` ends the session.
#[async_trait]
pub trait SpeechSource: Send {
    async fn next_utterance(&mut self) -> Result<Option<Transcript>, VoxlineError>;
}

/// Speaks assistant replies.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, text: &str) -> Result<PlaybackOutcome, VoxlineError>;
}

/// Pulls utterances from a source, runs them through the orchestrator and
/// hands replies to the sink.
pub struct VoiceLoop<S, K> {
    source: S,
    sink: K,
    last_processed: Option<String>,
}

impl<S: SpeechSource, K: SpeechSink> VoiceLoop<S, K> {
    pub fn new(source: S, sink: K) -> Self {
        Self {
            source,
            sink,
            last_processed: None,
        }
    }

    /// Run until the source is exhausted.
    ///
    /// Returns the number of utterances that produced a reply. Chat failures
    /// are left on the orchestrator's status and do not stop the loop; a
    /// source error does.
    pub async fn run(&mut self, chat: &mut ChatOrchestrator) -> Result<usize, VoxlineError> {
        let mut replies = 0;
        while let Some(transcript) = self.next_utterance().await? {
            if self.handle(chat, transcript).await.is_some() {
                replies += 1;
            }
        }
        info!(replies, "Speech source ended");
        Ok(replies)
    }

    /// Pull the next utterance without processing it.
    pub async fn next_utterance(&mut self) -> Result<Option<Transcript>, VoxlineError> {
        self.source.next_utterance().await
    }

    /// Process one utterance. Blank text and an exact repeat of the previous
    /// utterance are ignored; an utterance whose send failed may be repeated.
    pub async fn handle(
        &mut self,
        chat: &mut ChatOrchestrator,
        transcript: Transcript,
    ) -> Option<Reply> {
        let text = transcript.text.trim();
        if text.is_empty() {
            return None;
        }
        if self.last_processed.as_deref() == Some(text) {
            debug!("Ignoring repeated utterance");
            return None;
        }
        self.last_processed = Some(text.to_string());
        debug!(confidence = transcript.confidence, "Utterance finalized");

        let reply = match chat.send(text).await {
            Ok(reply) => reply?,
            Err(e) => {
                warn!("No reply for utterance: {}", e);
                self.last_processed = None;
                return None;
            }
        };

        match self.sink.speak(&reply.text).await {
            Ok(PlaybackOutcome::Completed) => {}
            Ok(PlaybackOutcome::Interrupted) => debug!("Playback interrupted"),
            Err(e) => warn!("Speech playback failed: {}", e),
        }
        Some(reply)
    }

    /// Forget the previous utterance so the same text is accepted again.
    pub fn forget_last(&mut self) {
        self.last_processed = None;
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }
}
