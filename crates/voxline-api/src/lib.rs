//! Voxline API crate - the chat proxy in front of an upstream completion
//! service.
//!
//! Validates chat requests, assembles the prompt, calls the upstream
//! provider, and translates upstream failures into the error bodies the
//! chat client classifies.

pub mod error;
pub mod handlers;
pub mod provider;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use provider::{CompletionProvider, OpenAiProvider};
pub use routes::{create_router, start_server};
pub use state::AppState;
