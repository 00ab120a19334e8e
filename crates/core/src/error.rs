use std::path::PathBuf;

use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// A cataloged file is absent from the filesystem at delivery time.
    #[error("Source file missing on disk: {}", path.display())]
    SourceMissing { path: PathBuf },

    /// A path segment would escape its base directory or contains
    /// characters the filesystem cannot hold.
    #[error("Invalid path: {0}")]
    PathTraversal(String),

    /// An upload or rename target is already present.
    #[error("Already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// The upload stream failed before completion (disconnect, framing, I/O).
    #[error("Upload interrupted: {0}")]
    UploadInterrupted(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Map an I/O failure on `path`, turning `NotFound` into
    /// [`CoreError::SourceMissing`].
    pub fn from_source_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            CoreError::SourceMissing { path }
        } else {
            CoreError::Internal(format!("I/O error on {}: {err}", path.display()))
        }
    }
}
