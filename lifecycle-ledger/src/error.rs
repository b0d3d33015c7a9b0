//! Error types for the ledger

use crate::types::{Address, AssetId, AssetStatus, Role};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Taxonomy surfaced to callers of a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller lacks the required role or ownership
    Authorization,
    /// Requested transition invalid from the current status
    StateTransition,
    /// Unknown asset id
    NotFound,
    /// Malformed request
    InvalidInput,
    /// Storage, serialization, actor or configuration failure
    Infrastructure,
}

impl ErrorKind {
    /// Short label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Authorization => "authorization",
            ErrorKind::StateTransition => "state_transition",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Infrastructure => "infrastructure",
        }
    }
}

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Caller does not hold the role the operation requires
    #[error("Authorization error: {caller} lacks required role {required}")]
    Unauthorized {
        /// Caller address
        caller: Address,
        /// Role the operation requires
        required: Role,
    },

    /// Caller holds the role but does not own the asset
    #[error("Authorization error: {caller} is not the owner of asset {asset_id} (owner is {owner})")]
    NotOwner {
        /// Caller address
        caller: Address,
        /// Asset id
        asset_id: AssetId,
        /// Current owner
        owner: Address,
    },

    /// Asset is not in a status the transition may start from
    #[error(
        "State transition error: asset {asset_id} is {actual}, expected {}",
        join_statuses(.expected)
    )]
    InvalidTransition {
        /// Asset id
        asset_id: AssetId,
        /// Current status
        actual: AssetStatus,
        /// Statuses the transition accepts
        expected: Vec<AssetStatus>,
    },

    /// Asset not found
    #[error("Asset not found: {0}")]
    AssetNotFound(AssetId),

    /// Invalid request input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Notification bus error
    #[error("Notification error: {0}")]
    Notification(#[from] notification_bus::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthorized { .. } | Error::NotOwner { .. } => ErrorKind::Authorization,
            Error::InvalidTransition { .. } => ErrorKind::StateTransition,
            Error::AssetNotFound(_) => ErrorKind::NotFound,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            _ => ErrorKind::Infrastructure,
        }
    }
}

fn join_statuses(statuses: &[AssetStatus]) -> String {
    statuses
        .iter()
        .map(AssetStatus::name)
        .collect::<Vec<_>>()
        .join(" or ")
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}
