//! # mathz-llm: Generation Layer for MATHZ
//!
//! Turns a problem statement into a validated, step-by-step explanation
//! from an external text model:
//!   - **Complexity detection** picks one of three prompt templates
//!   - **Prompt builder** renders it (plus a strict variant for retries)
//!   - **Validator** checks the label schema and parses the steps
//!   - **Orchestrator** runs the normal → strict → fallback ladder with
//!     cooperative cancellation
//!
//! # Architecture
//!
//! ```text
//! Normal  : complexity template                 [1 call when output conforms]
//! Strict  : template + format block, lower temp [only after non-conforming output]
//! Fallback: answer-only prompt                  [degraded explanation]
//! ```
//!
//! Backends ([`LlmClient`] for Ollama and OpenAI-compatible servers, or any
//! [`GenerativeModel`]) make one request per call; the ladder is the only
//! retry mechanism.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]

pub mod client;
pub mod complexity;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod types;
pub mod validate;

pub use client::{GenerativeModel, LlmClient};
pub use complexity::ComplexityDetector;
pub use config::LlmConfig;
pub use error::LlmError;
pub use orchestrator::Orchestrator;
pub use types::{Complexity, ExplainOutcome, Generation, GenerationAttempt, GenerationOptions, PromptVariant};
