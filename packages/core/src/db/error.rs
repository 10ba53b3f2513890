//! Database Error Types
//!
//! This module defines error types for database operations, providing
//! clear error handling for connection, initialization, and query failures.

use std::path::PathBuf;
use thiserror::Error;

/// SQLite primary result code for a locked database file
const SQLITE_BUSY: i32 = 5;

/// SQLite primary result code for a locked table
const SQLITE_LOCKED: i32 = 6;

/// Database operation errors
///
/// Covers all error cases for database connection, initialization,
/// and statement execution. Structural failures of the hierarchy itself are
/// handled by the service-layer `HierarchyError`.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Permission denied when accessing database
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// Database or table locked by another writer (retryable)
    #[error("Database busy: {context}")]
    Busy { context: String },

    /// Row could not be decoded into a model
    #[error("Malformed row: {context}")]
    MalformedRow { context: String },
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Create a malformed row error
    pub fn malformed_row(context: impl Into<String>) -> Self {
        Self::MalformedRow {
            context: context.into(),
        }
    }

    /// Wrap a libsql failure, classifying lock contention as `Busy`
    pub fn from_libsql(context: impl Into<String>, error: libsql::Error) -> Self {
        let context = format!("{}: {}", context.into(), error);
        if is_busy(&error) {
            Self::Busy { context }
        } else {
            Self::SqlExecutionError { context }
        }
    }

    /// Whether re-executing the whole operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Busy { .. } => true,
            Self::LibsqlError(e) => is_busy(e),
            _ => false,
        }
    }
}

fn is_busy(error: &libsql::Error) -> bool {
    if let libsql::Error::SqliteFailure(code, _) = error {
        if matches!(*code & 0xff, SQLITE_BUSY | SQLITE_LOCKED) {
            return true;
        }
    }
    let message = error.to_string().to_ascii_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
}
