//! Error types for the case engine.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::PlanItemState;

/// Message reported when a stage is completed manually while children still
/// block it.
pub const STAGE_NOT_COMPLETEABLE: &str = "Can only complete a stage plan item instance that is \
                                          marked as completeable (there might still be active \
                                          children)";

/// Comprehensive error type for all engine operations.
#[derive(Error, Debug)]
pub enum CaseError {
    /// A command targeted an instance that is not in the state it requires
    #[error("Illegal state: {message}")]
    IllegalState { message: String },
    /// A command was refused because its precondition does not hold
    #[error("{message}")]
    IllegalArgument { message: String },
    /// The rule evaluator failed while computing a guard
    #[error("Failed to evaluate expression '{expression}': {reason}")]
    EvaluationFailure { expression: String, reason: String },
    /// Case instance not found for the given ID
    #[error("Case instance with ID {id} not found")]
    CaseNotFound { id: u64 },
    /// Plan item instance not found for the given ID
    #[error("Plan item instance with ID {id} not found")]
    PlanItemNotFound { id: u64 },
    /// No deployed case definition with the given key
    #[error("Case definition '{key}' not found")]
    DefinitionNotFound { key: String },
    /// Database connection or query errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Builder for creating database errors with optional context.
pub struct DatabaseErrorBuilder {
    message: String,
}

impl DatabaseErrorBuilder {
    /// Create a new database error builder with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error with the given source.
    pub fn with_source(self, source: rusqlite::Error) -> CaseError {
        CaseError::Database {
            message: self.message,
            source,
        }
    }
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> CaseError {
        CaseError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl CaseError {
    /// Creates a builder for database errors.
    pub fn database(message: impl Into<String>) -> DatabaseErrorBuilder {
        DatabaseErrorBuilder::new(message)
    }

    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    /// An instance was found in `actual` while the command needs `expected`.
    pub fn unexpected_state(id: u64, expected: PlanItemState, actual: PlanItemState) -> Self {
        CaseError::IllegalState {
            message: format!(
                "plan item instance {id} is {actual}, expected {expected}",
                actual = actual.as_str(),
                expected = expected.as_str()
            ),
        }
    }

    /// The error raised by a manual stage completion that is not allowed yet.
    pub fn stage_not_completeable() -> Self {
        CaseError::IllegalArgument {
            message: STAGE_NOT_COMPLETEABLE.to_string(),
        }
    }

    /// Returns true for the errors that mean "nothing with that ID exists".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CaseError::CaseNotFound { .. }
                | CaseError::PlanItemNotFound { .. }
                | CaseError::DefinitionNotFound { .. }
        )
    }
}

/// Extension trait for Result to provide concise error mapping with
/// anyhow-style context.
pub trait ResultExt<T, E> {
    /// Add context to any error type, converting to CaseError.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

/// Specialized extension trait for database-related Results.
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message.
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| CaseError::Configuration {
            message: format!("{}: {}", context, e),
        })
    }
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| CaseError::database(message).with_source(e))
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, CaseError>;
