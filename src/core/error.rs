//! Error types for the record mapper
//!
//! This module defines all error types that can occur while configuring a
//! connection, synthesizing SQL, talking to the database, or mapping rows.

/// Result type alias for mapper and database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error types for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// A required connection setting is missing or invalid
    #[error("Configuration error for '{key}': {message}")]
    Configuration { key: String, message: String },

    /// Connection error (generic)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Connection timeout
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Query timeout
    #[error("Query timeout after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// Type conversion error outside of record mapping
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A column value could not be converted into a record field
    #[error("Cannot map column '{field}': expected {expected}, got {actual}")]
    Mapping {
        field: String,
        expected: String,
        actual: String,
    },

    /// Statement text could not be synthesized from the record metadata
    #[error("SQL synthesis error: {0}")]
    SqlSynthesis(String),

    /// Table not found
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration file is not valid JSON
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// PostgreSQL error
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    PostgresError(#[from] tokio_postgres::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Create a configuration error for the given setting key
    pub fn configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        DatabaseError::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a new connection error (generic)
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionError(msg.into())
    }

    /// Create a connection timeout error
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        DatabaseError::ConnectionTimeout { timeout_ms }
    }

    /// Create a new query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        DatabaseError::QueryError(msg.into())
    }

    /// Create a query timeout error
    pub fn query_timeout(timeout_ms: u64) -> Self {
        DatabaseError::QueryTimeout { timeout_ms }
    }

    /// Create a new type mismatch error
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        DatabaseError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a mapping error for a record field
    pub fn mapping(field: impl Into<String>, expected: &str, actual: impl Into<String>) -> Self {
        DatabaseError::Mapping {
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.into(),
        }
    }

    /// Create a new SQL synthesis error
    pub fn synthesis<S: Into<String>>(msg: S) -> Self {
        DatabaseError::SqlSynthesis(msg.into())
    }

    /// Create a new transaction error
    pub fn transaction<S: Into<String>>(msg: S) -> Self {
        DatabaseError::TransactionError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Other(msg.into())
    }

    /// True for errors raised before any statement reached the database
    pub fn is_synthesis(&self) -> bool {
        matches!(self, DatabaseError::SqlSynthesis(_))
    }
}
