//! LLM error types.

use thiserror::Error;

/// Errors that can occur during generation.
///
/// Output that does not follow the label schema is never an error: the
/// orchestrator absorbs it by moving down the tier ladder.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The model could not be reached, timed out, or answered with an
    /// HTTP error. Surfaced immediately, never retried through the ladder.
    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// The caller's cancellation token fired while a call was in flight.
    #[error("Generation cancelled")]
    Cancelled,

    /// Invalid configuration or prompt template.
    #[error("LLM configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::GenerationUnavailable(format!("request timed out: {err}"))
        } else if err.is_connect() {
            LlmError::GenerationUnavailable(format!("connection failed: {err}"))
        } else {
            LlmError::GenerationUnavailable(err.to_string())
        }
    }
}

impl From<mathz_core::MathzError> for LlmError {
    fn from(err: mathz_core::MathzError) -> Self {
        LlmError::Config(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, LlmError>;
