//! Error types shared by the chapter sync core

use std::path::PathBuf;

/// Result type for chapter sync operations
pub type Result<T> = std::result::Result<T, ChapterSyncError>;

/// Error types for chapter sync operations
#[derive(thiserror::Error, Debug)]
pub enum ChapterSyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Sidecar text that cannot be read as XML, even after dropping trailing noise
    #[error("Malformed NFO document: {0}")]
    MalformedDocument(String),

    #[error("Chapter image extraction failed: {0}")]
    Extraction(String),

    #[error("Chapter store error: {0}")]
    Store(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("NFO file not found: {0}")]
    MissingSidecar(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ChapterSyncError {
    /// Whether this error means "the sidecar holds no usable chapter data"
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            ChapterSyncError::MalformedDocument(_) | ChapterSyncError::MissingSidecar(_)
        )
    }
}
