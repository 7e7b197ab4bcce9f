//! Database error types

use thiserror::Error;

/// Database operation errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl DbError {
    /// Map a unique-constraint violation to `Duplicate`, anything else to `Query`
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unique");
                return DbError::Duplicate(format!("{} violates {}", what, constraint));
            }
        }
        DbError::Query(err)
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;
