//! Voxline application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Either serve the chat proxy, or open the SQLite store and run the
//!    terminal chat through the offline-resilient pipeline

mod cli;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use voxline_api::{routes, AppState, OpenAiProvider};
use voxline_chat::{
    ChatOrchestrator, ConversationStore, HttpChatGateway, NetworkMonitor, OfflineResponder,
    ResponseCache,
};
use voxline_core::clock::{Clock, SystemClock};
use voxline_core::config::VoxlineConfig;
use voxline_storage::{Database, KvStore, SqliteKvStore};

use crate::cli::{CliArgs, Command};

/// Expand a leading `~/` to the home directory.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

async fn serve(config: VoxlineConfig, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut proxy = config.proxy;
    proxy.port = cli::resolve_port(port, proxy.port);

    let provider = OpenAiProvider::from_config(&proxy)?;
    let state = AppState::new(proxy.clone(), Arc::new(provider));
    routes::start_server(&proxy, state).await?;
    Ok(())
}

async fn chat(
    mut config: VoxlineConfig,
    offline: bool,
    endpoint: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(endpoint) = endpoint {
        config.chat.endpoint_url = endpoint;
    }

    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("voxline.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let store: Arc<dyn KvStore> = Arc::new(SqliteKvStore::new(db));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let cache = ResponseCache::open(Arc::clone(&store), Arc::clone(&clock), &config.cache);
    let conversation =
        ConversationStore::open(Arc::clone(&store), Arc::clone(&clock), &config.conversation);
    let network = NetworkMonitor::new(!(offline || config.chat.start_offline));
    let gateway = HttpChatGateway::new(&config.chat)?;
    tracing::info!(endpoint = gateway.endpoint(), "Chat gateway ready");

    let mut orchestrator = ChatOrchestrator::new(
        &config.chat,
        cache,
        conversation,
        OfflineResponder::new(clock),
        network,
        Arc::new(gateway),
    );

    repl::run(&mut orchestrator).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = VoxlineConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    // Logs go to stderr so the terminal chat owns stdout.
    let default_level = config.general.log_level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Voxline v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    match args.command() {
        Command::Serve { port } => serve(config, port).await,
        Command::Chat { offline, endpoint } => chat(config, offline, endpoint).await,
    }
}
