use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Driver messages of write races that a fresh transaction resolves.
const CONTENTION_MESSAGES: &[&str] = &[
    "database is locked",
    "database table is locked",
    "could not serialize access",
    "deadlock detected",
];

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Invalid input data.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl StoreError {
    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether the transaction lost a race with a concurrent writer.
    ///
    /// Lock upgrades and serialization failures clear on a fresh transaction,
    /// as do two inserts of one natural key.
    pub fn is_contention(&self) -> bool {
        let Self::Database(err) = self else {
            return false;
        };
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            return true;
        }
        let message = err.to_string();
        CONTENTION_MESSAGES.iter().any(|m| message.contains(m))
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
