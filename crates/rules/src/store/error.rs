//! Error types and load result structures for collection stores.

use std::path::PathBuf;

/// Errors that can occur while reading collection definitions.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Definition is well-formed but unusable (e.g. empty id).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The backing source could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Outcome of loading a single definition file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    Loaded { collection_id: String },
    /// File was skipped (dotfile, unsupported extension, tombstoned).
    Skipped { reason: String },
    /// Parse or validation error occurred.
    Failed { error: String },
}
