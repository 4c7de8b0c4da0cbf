//! Error types for pinboard.

use thiserror::Error;

/// Common error type for pinboard.
#[derive(Error, Debug)]
pub enum PinboardError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// A multi-statement transaction (such as a move) failed and was rolled back.
    ///
    /// The operation had no visible effect and may be retried.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The principal is neither owner nor member of the board.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Cache backend unavailable or rejected an operation.
    #[error("cache error: {0}")]
    Cache(String),

    /// Snapshot or event could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PinboardError {
    /// Whether the caller may retry the failed operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PinboardError::Transaction(_) | PinboardError::DatabaseConnection(_)
        )
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for PinboardError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                PinboardError::DatabaseConnection(e.to_string())
            }
            other => PinboardError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PinboardError {
    fn from(e: serde_json::Error) -> Self {
        PinboardError::Serialization(e.to_string())
    }
}

impl From<validator::ValidationErrors> for PinboardError {
    fn from(e: validator::ValidationErrors) -> Self {
        PinboardError::Validation(e.to_string())
    }
}

/// Result type alias for pinboard operations.
pub type Result<T> = std::result::Result<T, PinboardError>;
