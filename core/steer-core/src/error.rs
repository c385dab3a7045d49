//! Error types for the experiment result store.
//!
//! All public APIs return `StoreResult<T>`; library code does not panic.
//! Duplicate inserts and fingerprint mismatches are *not* errors; they are
//! reported through [`crate::storage::InsertOutcome`] and
//! [`crate::registry::FingerprintStatus`].

use thiserror::Error;

/// Unified error type for all store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error (connectivity, schema initialization, statement failure)
    #[error("sqlite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// Apache Arrow error (RecordBatch operations)
    #[error("arrow error: {source}")]
    Arrow {
        #[from]
        source: arrow::error::ArrowError,
    },

    /// Apache Parquet error (file I/O)
    #[error("parquet error: {source}")]
    Parquet {
        #[from]
        source: parquet::errors::ParquetError,
    },

    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Query path was never registered
    #[error("query '{0}' not registered")]
    QueryNotFound(String),

    /// No configuration exists for the (query, disabled rules) pair
    #[error("no configuration for query '{path}' with disabled rules [{disabled_rules}]")]
    ConfigurationNotFound {
        path: String,
        disabled_rules: String,
    },

    /// Insert rejected by a constraint other than a unique key
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid or unreadable configuration
    #[error("config error: {0}")]
    Config(String),

    /// Invalid arguments
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Invalid operation
    #[error("invalid operation: {message}\nContext: {context}")]
    InvalidOperation { message: String, context: String },
}

/// Result type alias for all store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
