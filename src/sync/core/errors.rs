//! Error types for the synchronization layer.

use thiserror::Error;

/// Synchronization layer error type.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The transport collaborator failed to complete a call.
    #[error("transport error: {0}")]
    Transport(String),
    /// The transport answered but reported `success: false`.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// `SQLite` side-store error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;
