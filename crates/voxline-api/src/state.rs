//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use voxline_core::config::ProxyConfig;

use crate::provider::CompletionProvider;

/// Shared proxy state, passed to handlers via axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Proxy configuration.
    pub config: Arc<ProxyConfig>,
    /// Upstream completion backend.
    pub provider: Arc<dyn CompletionProvider>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ProxyConfig, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            start_time: Instant::now(),
        }
    }
}
