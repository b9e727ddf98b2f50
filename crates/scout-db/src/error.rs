//! Database error types.

use thiserror::Error;

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Database-specific errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to open or create the database.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Migration execution failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// A stored value could not be decoded into its domain type.
    #[error("decode error: {0}")]
    Decode(String),

    /// Record with the given identifier does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Underlying `SQLx` error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}
