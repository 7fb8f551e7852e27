use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VoxlineError};

/// Top-level configuration for Voxline.
///
/// Loaded from `~/.voxline/config.toml` by default. Every section falls back
/// to its defaults when omitted, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoxlineConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl VoxlineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VoxlineConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VoxlineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the SQLite store.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.voxline/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Client-side chat pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// URL of the chat proxy endpoint.
    pub endpoint_url: String,
    /// Per-request timeout for the chat endpoint.
    pub request_timeout_secs: u64,
    /// Number of prior messages sent along as conversation history.
    pub max_history_messages: usize,
    /// Start with connectivity marked as offline.
    pub start_offline: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://127.0.0.1:3040/api/chat".to_string(),
            request_timeout_secs: 30,
            max_history_messages: 20,
            start_offline: false,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries older than this are invisible to lookups.
    pub ttl_hours: u64,
    /// Maximum number of entries kept (oldest evicted first).
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            max_entries: 100,
        }
    }
}

/// Conversation persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Number of most recent messages written to durable storage.
    pub max_persisted_messages: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_persisted_messages: 50,
        }
    }
}

/// Chat proxy server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Address the proxy binds to.
    pub bind: String,
    /// Port the proxy listens on.
    pub port: u16,
    /// Upstream chat-completions URL (OpenAI-compatible).
    pub upstream_url: String,
    /// Environment variable holding the upstream API key.
    pub api_key_env: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
    /// Requests per second accepted before answering 429.
    pub rate_limit_per_sec: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3040,
            upstream_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 150,
            temperature: 0.7,
            system_prompt: "You are a helpful AI assistant in a voice chat application. \
                Keep your responses concise and conversational since they will be read aloud. \
                Aim for 1-3 sentences unless specifically asked for more detail. \
                Be friendly, helpful, and engaging."
                .to_string(),
            rate_limit_per_sec: 20,
        }
    }
}
