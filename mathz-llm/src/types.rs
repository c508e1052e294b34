//! Core types for generation requests, attempts and outcomes.

use std::fmt;

use mathz_core::StructuredExplanation;
use serde::{Deserialize, Serialize};

/// How elaborate an explanation the problem calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// One operation or a one-variable linear equation.
    Simple,
    /// Everything in between.
    Medium,
    /// Calculus, trigonometry, logarithms or matrices.
    Complex,
}

impl Complexity {
    /// All tiers, simplest first.
    #[must_use]
    pub fn all() -> &'static [Complexity] {
        &[Self::Simple, Self::Medium, Self::Complex]
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
        };
        write!(f, "{name}")
    }
}

/// Which rung of the tier ladder produced an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVariant {
    /// Complexity template as-is.
    Normal,
    /// Complexity template plus the strict-format block.
    Strict,
    /// Answer-only prompt.
    Fallback,
}

impl fmt::Display for PromptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Strict => "strict",
            Self::Fallback => "fallback",
        };
        write!(f, "{name}")
    }
}

/// Sampling options for a single model call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature (0.0 = deterministic).
    pub temperature: f32,
    /// Nucleus sampling mass.
    pub top_p: f32,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Text returned by a model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// The generated text.
    pub text: String,
    /// Wall-clock latency of the call.
    pub elapsed_ms: u64,
}

/// Record of one model call made while explaining a problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    /// Ladder rung.
    pub variant: PromptVariant,
    /// Raw model output.
    pub raw_output: Option<String>,
    /// Whether the output passed the structure check.
    pub valid: bool,
    /// Latency of this call.
    pub elapsed_ms: u64,
}

/// Result of [`crate::orchestrator::Orchestrator::explain`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExplainOutcome {
    /// An explanation was produced (possibly degraded).
    Done {
        /// Parsed or synthesized explanation.
        explanation: StructuredExplanation,
        /// More than one attempt was needed.
        was_retried: bool,
        /// Every structured attempt failed; this is the answer-only fallback.
        degraded: bool,
        /// Sum of all attempt latencies.
        elapsed_ms: u64,
        /// Every attempt, in order.
        attempts: Vec<GenerationAttempt>,
    },
    /// The caller cancelled; nothing is returned.
    Cancelled {
        /// Model calls that completed before cancellation was observed.
        attempts_made: usize,
    },
}

impl ExplainOutcome {
    /// Whether the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The explanation, if the run completed.
    #[must_use]
    pub fn explanation(&self) -> Option<&StructuredExplanation> {
        match self {
            Self::Done { explanation, .. } => Some(explanation),
            Self::Cancelled { .. } => None,
        }
    }
}
