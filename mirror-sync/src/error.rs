//! Error types for the mirror synchronizer

use lifecycle_ledger::AssetId;
use thiserror::Error;
use uuid::Uuid;

/// Result type for mirror operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Mirror errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// A notification could not be applied to the mirror
    #[error("Sync apply error at offset {offset}: {reason}")]
    SyncApply {
        /// Notification offset
        offset: u64,
        /// What went wrong
        reason: String,
    },

    /// Mirror row not present
    #[error("Asset not found in mirror: {0}")]
    AssetNotFound(AssetId),

    /// Unknown draft token
    #[error("Draft not found: {0}")]
    DraftNotFound(Uuid),

    /// Malformed request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Row encoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Ledger error surfaced during resync
    #[error("Ledger error: {0}")]
    Ledger(#[from] lifecycle_ledger::Error),

    /// Notification bus error
    #[error("Notification error: {0}")]
    Notification(#[from] notification_bus::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for SyncError {
    fn from(err: rocksdb::Error) -> Self {
        SyncError::Storage(err.to_string())
    }
}

impl From<SyncError> for notification_bus::Error {
    fn from(err: SyncError) -> Self {
        notification_bus::Error::Handler(err.to_string())
    }
}
