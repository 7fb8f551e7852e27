//! CLI argument definitions for the Voxline application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Voxline - offline-resilient voice chat client and chat proxy.
#[derive(Parser, Debug)]
#[command(name = "voxline", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the SQLite store.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the chat proxy server.
    Serve {
        /// Proxy port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
    /// Chat interactively on the terminal (the default).
    Chat {
        /// Start with connectivity marked offline.
        #[arg(long = "offline")]
        offline: bool,
        /// Chat endpoint URL, overriding the configured one.
        #[arg(long = "endpoint")]
        endpoint: Option<String>,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > VOXLINE_CONFIG env var > ~/.voxline/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("VOXLINE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// The subcommand to run; `chat` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat {
            offline: false,
            endpoint: None,
        })
    }

    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Resolve the proxy port.
///
/// Priority: --port flag > VOXLINE_PORT env var > config file value > 3040.
pub fn resolve_port(flag: Option<u16>, config_port: u16) -> u16 {
    if let Some(p) = flag {
        return p;
    }
    if let Ok(val) = std::env::var("VOXLINE_PORT") {
        if let Ok(p) = val.parse::<u16>() {
            return p;
        }
    }
    if config_port != 0 {
        return config_port;
    }
    3040
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".voxline").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".voxline").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_chat() {
        let args = CliArgs::parse_from(["voxline"]);
        assert_eq!(
            args.command(),
            Command::Chat {
                offline: false,
                endpoint: None
            }
        );
    }

    #[test]
    fn test_serve_with_port_and_global_flags() {
        let args = CliArgs::parse_from(["voxline", "serve", "--port", "4000", "-d", "/tmp/vx"]);
        assert_eq!(args.command(), Command::Serve { port: Some(4000) });
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/tmp/vx"));
    }

    #[test]
    fn test_config_flag_wins() {
        let args = CliArgs::parse_from(["voxline", "--config", "/etc/voxline.toml", "chat"]);
        assert_eq!(
            args.resolve_config_path(),
            PathBuf::from("/etc/voxline.toml")
        );
    }

    #[test]
    fn test_port_flag_wins() {
        assert_eq!(resolve_port(Some(8080), 3040), 8080);
    }
}
