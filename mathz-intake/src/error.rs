//! Error type for the intake layer.

use thiserror::Error;

/// Errors surfaced by [`crate::pipeline::IntakePipeline`].
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The submitted text was empty after trimming.
    #[error("Problem text is empty")]
    EmptyProblem,

    /// Collection, persistence or classifier failure.
    #[error(transparent)]
    Core(#[from] mathz_core::MathzError),

    /// Generation failure (model unavailable, bad configuration).
    #[error(transparent)]
    Llm(#[from] mathz_llm::LlmError),

    /// Configuration could not be loaded or logging could not start.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, IntakeError>;
