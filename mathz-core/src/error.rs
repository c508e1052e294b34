//! Error types for the MATHZ core library.

use thiserror::Error;

/// Top-level error type for all MATHZ core operations.
#[derive(Error, Debug)]
pub enum MathzError {
    /// Attempted to delete the default collection or another system collection.
    #[error("Collection '{name}' is protected and cannot be deleted")]
    ProtectedCollection {
        /// Name of the protected collection.
        name: String,
    },

    /// The delete/migrate transaction failed and was rolled back.
    #[error("Collection migration rolled back: {0}")]
    MigrationTransactionFailure(#[source] Box<MathzError>),

    /// A collection with the given ID was not found.
    #[error("Collection not found: {0}")]
    CollectionNotFound(crate::CollectionId),

    /// A problem with the given ID was not found.
    #[error("Problem not found: {0}")]
    ProblemNotFound(crate::ProblemId),

    /// No collection is flagged as the default (store was never seeded).
    #[error("No default collection configured")]
    MissingDefaultCollection,

    /// User input failed validation.
    #[error("Invalid {field}: {reason}")]
    Validation {
        /// Which field was rejected.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MathzError {
    /// Shorthand for a [`MathzError::Validation`].
    #[must_use]
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, MathzError>;
