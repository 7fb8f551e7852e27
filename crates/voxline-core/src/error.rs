use thiserror::Error;

/// Top-level error type for Voxline.
///
/// Subsystem crates keep their own error types where the caller needs to
/// branch on them (see `voxline_chat::ChatError`) and convert into this one
/// at crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VoxlineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Voice error: {0}")]
    Voice(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for VoxlineError {
    fn from(err: toml::de::Error) -> Self {
        VoxlineError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VoxlineError {
    fn from(err: toml::ser::Error) -> Self {
        VoxlineError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VoxlineError {
    fn from(err: serde_json::Error) -> Self {
        VoxlineError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Voxline operations.
pub type Result<T> = std::result::Result<T, VoxlineError>;
