//! Domain-level error types for chat-backup-exporter.
//!
//! All errors are typed with `thiserror` and provide meaningful context
//! without exposing internal details to end users.

use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Output directory does not exist or cannot be written to.
    #[error("Can't access output directory: {path}")]
    OutputInaccessible { path: PathBuf },

    /// A previous export run is still active.
    #[error("Previous task has not completed")]
    ExportRunning,

    /// A setter was called while a run is active.
    #[error("Can't reconfigure while an export is running")]
    ConfigureWhileRunning,

    /// The primary backup index could not be loaded.
    #[error("Failed to parse the backup data in: {path}")]
    BackupIndex {
        path: PathBuf,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Failed to open or query a database.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid or corrupted data in the backup.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a database error from a rusqlite error.
    pub fn database(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a backup-index error with its originating failure.
    pub fn backup_index(path: impl Into<PathBuf>, err: rusqlite::Error) -> Self {
        Self::BackupIndex {
            path: path.into(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
