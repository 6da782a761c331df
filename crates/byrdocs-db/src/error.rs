//! Error types for byrdocs-db.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for byrdocs-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in byrdocs-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    // ========================================================================
    // Row errors
    // ========================================================================
    /// A row addressed by key does not exist.
    #[error("{table} row not found: {key}")]
    NotFound { table: &'static str, key: String },

    /// A unique key is already taken.
    #[error("{table} row already exists: {key}")]
    Conflict { table: &'static str, key: String },

    // ========================================================================
    // Storage errors
    // ========================================================================
    /// Store file could not be read or written.
    #[error("Store I/O error at {path}: {message}")]
    StoreIo { path: PathBuf, message: String },

    /// Store file contains a line that is not a valid row.
    #[error("Store parse error at {path}:{line}: {message}")]
    StoreParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    // ========================================================================
    // General errors
    // ========================================================================
    /// IO error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a not-found error.
    pub fn not_found(table: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            table,
            key: key.to_string(),
        }
    }

    /// Create a unique-key conflict error.
    pub fn conflict(table: &'static str, key: impl ToString) -> Self {
        Self::Conflict {
            table,
            key: key.to_string(),
        }
    }

    /// Create a store I/O error.
    pub fn store_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StoreIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error means the addressed row is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
