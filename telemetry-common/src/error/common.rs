//! Common error types shared across crates.

use std::time::Duration;
use thiserror::Error;

/// Database-related errors.
///
/// Crate-specific errors keep the raw `sqlx::Error` and use
/// [`DatabaseError::from`] when they need to classify it.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DatabaseError {
    /// Query execution failed
    #[error("Query failed: {0}")]
    Query(String),

    /// Connection to database failed
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// A unique or check constraint rejected the write
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// Connection pool exhausted
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Query timeout
    #[error("Query timeout after {0:?}")]
    Timeout(Duration),
}

impl From<&sqlx::Error> for DatabaseError {
    fn from(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::Connection(err.to_string())
            }
            sqlx::Error::Database(db)
                if db.is_unique_violation() || db.is_check_violation() =>
            {
                DatabaseError::Constraint(db.message().to_string())
            }
            _ => DatabaseError::Query(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::from(&err)
    }
}
