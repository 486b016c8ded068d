//! Error types for the repository layer
//!
//! Provides error handling for constraint binding, model metadata,
//! statement generation and execution.

use std::fmt;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for repository operations
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Database connection or query error
    Database(String),
    /// Model metadata or input validation failed
    Validation(String),
    /// The model has no discoverable primary key, or the key has no value
    MissingPrimaryKey(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Connection pool error
    Connection(String),
    /// Configuration error
    Configuration(String),
    /// Query building error
    Query(String),
    /// A constraint value could not be converted into its declared data type
    Conversion {
        column: String,
        value: String,
        data_type: String,
        reason: String,
    },
    /// The default binder has no renderer for this comparison
    UnsupportedComparison { column: String, comparison: String },
    /// A constraint required by the caller is absent
    MissingRequiredField(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Database(msg) => write!(f, "Database error: {}", msg),
            ModelError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ModelError::MissingPrimaryKey(table) => {
                write!(f, "Primary key is missing or invalid for '{}'", table)
            }
            ModelError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ModelError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ModelError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ModelError::Query(msg) => write!(f, "Query error: {}", msg),
            ModelError::Conversion {
                column,
                value,
                data_type,
                reason,
            } => write!(
                f,
                "{} failed to convert '{}' into {} - {}",
                column, value, data_type, reason
            ),
            ModelError::UnsupportedComparison { column, comparison } => write!(
                f,
                "Comparison '{}' on '{}' is not implemented by the default binder",
                comparison, column
            ),
            ModelError::MissingRequiredField(name) => write!(f, "{} is required", name),
        }
    }
}

impl std::error::Error for ModelError {}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                ModelError::Connection(err.to_string())
            }
            other => ModelError::Database(other.to_string()),
        }
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
