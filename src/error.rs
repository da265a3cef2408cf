//! Error types for sqlport.

use thiserror::Error;

/// The main error type for sqlport operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend identifier is not one of the supported dialects.
    #[error("Unsupported dialect: '{0}'. Expected one of: postgres, mysql, mariadb, mssql, oracle, oci8, oracle11g, sqlite3")]
    UnsupportedDialect(String),

    /// A column value could not be bound to its destination field.
    #[error("Cannot bind column '{column}': {message}")]
    ColumnBind { column: String, message: String },

    /// The trailing LIMIT/OFFSET arguments are missing or not integers.
    #[error("Paging arguments: {0}")]
    PagingArguments(String),

    /// A single-record fetch returned no rows.
    #[error("Query returned no rows")]
    NoRows,

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a column bind error.
    pub fn bind(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ColumnBind {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a paging precondition error.
    pub fn paging(message: impl Into<String>) -> Self {
        Self::PagingArguments(message.into())
    }
}

/// Result type alias for sqlport operations.
pub type Result<T> = std::result::Result<T, Error>;
