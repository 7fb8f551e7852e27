//! Terminal chat: typed lines stand in for recognized speech and replies
//! are printed instead of spoken.

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;

use voxline_chat::{
    ChatOrchestrator, ChatStatus, PlaybackOutcome, SpeechSink, SpeechSource, Transcript,
    VoiceLoop,
};
use voxline_core::error::VoxlineError;

const HELP: &str = "Commands: /retry /clear /clear-cache /offline /online /status /help /quit";

/// Reads one utterance per line from stdin.
pub struct StdinSource {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSource for StdinSource {
    async fn next_utterance(&mut self) -> Result<Option<Transcript>, VoxlineError> {
        print!("you> ");
        std::io::stdout().flush()?;
        let line = self.lines.next_line().await?;
        Ok(line.map(Transcript::typed))
    }
}

/// Prints replies to stdout.
pub struct StdoutSink;

#[async_trait]
impl SpeechSink for StdoutSink {
    async fn speak(&self, text: &str) -> Result<PlaybackOutcome, VoxlineError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "assistant> {}", text)?;
        Ok(PlaybackOutcome::Completed)
    }
}

/// Slash commands understood by the terminal chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Retry,
    Clear,
    ClearCache,
    Offline,
    Online,
    Status,
    Help,
    Quit,
    Unknown(String),
}

impl ReplCommand {
    /// Parse a line starting with `/`; anything else is chat text.
    pub fn parse(line: &str) -> Option<Self> {
        let name = line.trim().strip_prefix('/')?;
        Some(match name.to_lowercase().as_str() {
            "retry" => ReplCommand::Retry,
            "clear" => ReplCommand::Clear,
            "clear-cache" => ReplCommand::ClearCache,
            "offline" => ReplCommand::Offline,
            "online" => ReplCommand::Online,
            "status" => ReplCommand::Status,
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" => ReplCommand::Quit,
            _ => ReplCommand::Unknown(name.to_string()),
        })
    }
}

/// Run the terminal chat until stdin closes or `/quit`.
pub async fn run(chat: &mut ChatOrchestrator) -> Result<(), VoxlineError> {
    let mut voice = VoiceLoop::new(StdinSource::new(), StdoutSink);
    let mut status = chat.subscribe_status();

    println!("{}", HELP);
    for message in chat.messages() {
        println!("{}> {}", message.role, message.content);
    }

    while let Some(transcript) = voice.next_utterance().await? {
        match ReplCommand::parse(&transcript.text) {
            Some(ReplCommand::Quit) => break,
            Some(command) => run_command(command, chat, &mut voice).await,
            None => {
                voice.handle(chat, transcript).await;
            }
        }
        report_failure(&mut status);
    }
    Ok(())
}

async fn run_command(
    command: ReplCommand,
    chat: &mut ChatOrchestrator,
    voice: &mut VoiceLoop<StdinSource, StdoutSink>,
) {
    match command {
        ReplCommand::Retry => match chat.retry_last_message().await {
            Ok(Some(reply)) => {
                if let Err(e) = voice.sink().speak(&reply.text).await {
                    tracing::warn!("Failed to print reply: {}", e);
                }
            }
            Ok(None) => println!("Nothing to retry."),
            Err(_) => {}
        },
        ReplCommand::Clear => {
            chat.clear_chat();
            voice.forget_last();
            println!("Conversation cleared.");
        }
        ReplCommand::ClearCache => {
            chat.clear_cache();
            voice.forget_last();
            println!("Cache and conversation cleared.");
        }
        ReplCommand::Offline => {
            chat.network().set_online(false);
            println!("Now offline.");
        }
        ReplCommand::Online => {
            chat.network().set_online(true);
            println!("Now online.");
        }
        ReplCommand::Status => {
            let cache = chat.cache_status();
            let status = chat.status();
            println!(
                "online: {}  messages: {}  cache: {} entries ({} bytes)  phase: {:?}",
                chat.network().is_online(),
                chat.messages().len(),
                cache.entries,
                cache.size_bytes,
                status.phase
            );
        }
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Unknown(name) => println!("Unknown command /{}. {}", name, HELP),
        ReplCommand::Quit => {}
    }
}

/// Print a newly published failure once.
fn report_failure(status: &mut watch::Receiver<ChatStatus>) {
    if !status.has_changed().unwrap_or(false) {
        return;
    }
    let current = status.borrow_and_update();
    if let (Some(error), Some(kind)) = (&current.error, current.error_kind) {
        println!("error [{}]: {}", kind, error);
        if current.retryable {
            println!("  type /retry to try again");
        }
    }
}
