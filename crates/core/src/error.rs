//! Error types for the Horizon engine.
//!
//! Only configuration mistakes surface as errors. Missing references and
//! unknown row ids are absorbed by the caller and never reach this type.

use alloc::string::String;

/// Result type alias for Horizon operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for Horizon operations.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// Table not registered.
    #[error("Table not found: {name}")]
    TableNotFound { name: String },
    /// Live view not registered.
    #[error("Session not found: {name}")]
    SessionNotFound { name: String },
    /// A live view with the same id is already registered.
    #[error("Session already exists: {id}")]
    DuplicateSession { id: String },
    /// Column not found.
    #[error("Column {column} not found in {table}")]
    ColumnNotFound { table: String, column: String },
    /// Invalid schema definition.
    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },
    /// Sort requested without a usable comparator.
    #[error("Cannot sort by {field}: {message}")]
    InvalidSort { field: String, message: String },
    /// Expression failed to compile, or no engine is configured.
    #[error("Expression `{text}` rejected: {message}")]
    Expression { text: String, message: String },
    /// A resolve edge would close a dependency cycle.
    #[error("Dependency cycle detected: {path}")]
    DependencyCycle { path: String },
    /// Malformed declarative configuration.
    #[error("Invalid config: {message}")]
    InvalidConfig { message: String },
    /// Invalid operation.
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl Error {
    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Creates a session not found error.
    pub fn session_not_found(name: impl Into<String>) -> Self {
        Error::SessionNotFound { name: name.into() }
    }

    /// Creates a duplicate session error.
    pub fn duplicate_session(id: impl Into<String>) -> Self {
        Error::DuplicateSession { id: id.into() }
    }

    /// Creates a column not found error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid sort error.
    pub fn invalid_sort(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidSort {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an expression error.
    pub fn expression(text: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Expression {
            text: text.into(),
            message: message.into(),
        }
    }

    /// Creates a dependency cycle error.
    pub fn dependency_cycle(path: impl Into<String>) -> Self {
        Error::DependencyCycle { path: path.into() }
    }

    /// Creates an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}
