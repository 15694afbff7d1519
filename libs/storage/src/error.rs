//! Error types for storage and state containers.

use thiserror::Error;

/// Errors from storage backends.
///
/// These never reach callers of [`crate::DurableStore`]; the store absorbs
/// them and degrades to the fallback backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("fallback quota exceeded: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded { needed: u64, quota: u64 },

    #[error("blocking storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from state container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// State could not be turned into a plain JSON snapshot.
    #[error("failed to snapshot {id}: {source}")]
    Serialize {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A patch produced a state that does not fit the container's shape.
    /// The container is left untouched.
    #[error("patch rejected by {id}: {source}")]
    Patch {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("container already registered: {0}")]
    DuplicateId(String),
}
