//! Error types for the notification bus

use thiserror::Error;

/// Notification bus error
#[derive(Debug, Error)]
pub enum Error {
    /// Handler rejected a message
    #[error("Handler error: {0}")]
    Handler(String),

    /// Offset store failure (load or commit)
    #[error("Offset store error: {0}")]
    OffsetStore(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal channel closed
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
