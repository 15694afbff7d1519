//! Backup error types.

use grayframe_storage::ContainerError;
use thiserror::Error;

/// Errors from exporting or importing a backup.
///
/// Every import variant is raised while parsing, before any container is
/// touched.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("backup must be a JSON object")]
    NotAnObject,

    #[error("backup has no `kind` tag and is not a legacy store dump")]
    MissingKind,

    #[error("unknown backup kind: {0}")]
    UnknownKind(String),

    #[error("invalid theme: {0}")]
    InvalidTheme(&'static str),

    /// A container required for export is not registered.
    #[error("container not registered: {0}")]
    MissingContainer(String),

    /// A container's snapshot does not have the section's shape.
    #[error("unexpected snapshot shape for {id}: {source}")]
    Snapshot {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("failed to encode backup: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BackupResult<T> = Result<T, BackupError>;
