//! Generation orchestrator: the tier ladder as an explicit state machine.
//!
//! ```text
//!         Start          Invalid            Invalid              Invalid
//!  Idle ───────► Normal ────────► Strict ─────────► Fallback ─────────► Done (degraded)
//!                  │ Valid          │ Valid           │ Valid
//!                  └────────────────┴─────────────────┴──────────────► Done
//!
//!  any non-terminal state ── CancelRequested ──► Cancelled
//! ```
//!
//! Tiers run strictly one after another. The cancellation token is checked
//! before each model call and raced against the call itself. A transport
//! failure ends the run with [`LlmError::GenerationUnavailable`]; it is not
//! a reason to try the next tier.

use std::sync::Arc;

use mathz_core::StructuredExplanation;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::GenerativeModel;
use crate::complexity::ComplexityDetector;
use crate::config::LlmConfig;
use crate::error::{LlmError, Result};
use crate::prompt::PromptBuilder;
use crate::types::{Complexity, ExplainOutcome, GenerationAttempt, PromptVariant};
use crate::validate::parse_structured;

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing attempted yet.
    Idle,
    /// About to call the model with this prompt variant.
    Attempt(PromptVariant),
    /// Terminal: an explanation (possibly degraded) is available.
    Done,
    /// Terminal: the caller cancelled.
    Cancelled,
}

impl State {
    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

/// Input to [`next_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Begin a run.
    Start,
    /// The last attempt produced conforming output.
    Valid,
    /// The last attempt did not conform.
    Invalid,
    /// The cancellation token fired.
    CancelRequested,
}

/// The ladder's transition function.
///
/// Terminal states absorb every event; events that make no sense in a
/// state leave it unchanged.
#[must_use]
pub fn next_state(state: State, event: Event) -> State {
    match (state, event) {
        (s, _) if s.is_terminal() => s,
        (_, Event::CancelRequested) => State::Cancelled,
        (State::Idle, Event::Start) => State::Attempt(PromptVariant::Normal),
        (State::Attempt(_), Event::Valid) => State::Done,
        (State::Attempt(PromptVariant::Normal), Event::Invalid) => {
            State::Attempt(PromptVariant::Strict)
        }
        (State::Attempt(PromptVariant::Strict), Event::Invalid) => {
            State::Attempt(PromptVariant::Fallback)
        }
        (State::Attempt(PromptVariant::Fallback), Event::Invalid) => State::Done,
        (s, _) => s,
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters across all runs of one orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    /// Runs started.
    pub runs: u64,
    /// Model calls made.
    pub model_calls: u64,
    /// Runs whose first answer was valid.
    pub first_try_valid: u64,
    /// Runs that needed more than one call.
    pub retried: u64,
    /// Runs that ended with the degraded explanation.
    pub degraded: u64,
    /// Runs cancelled by the caller.
    pub cancelled: u64,
    /// Runs aborted by a transport failure.
    pub unavailable: u64,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives a [`GenerativeModel`] through the tier ladder.
///
/// Holds configuration only; every [`explain`](Self::explain) call is
/// independent and the orchestrator can be shared across tasks.
pub struct Orchestrator {
    model: Arc<dyn GenerativeModel>,
    prompts: PromptBuilder,
    detector: ComplexityDetector,
    config: LlmConfig,
    stats: Arc<Mutex<OrchestratorStats>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Build an orchestrator over `model`.
    ///
    /// # Errors
    /// Returns `LlmError::Config` if a configured prompt override is
    /// invalid or the complexity detector fails to compile.
    pub fn new(model: Arc<dyn GenerativeModel>, config: LlmConfig) -> Result<Self> {
        Ok(Self {
            model,
            prompts: PromptBuilder::with_overrides(&config.prompts)?,
            detector: ComplexityDetector::new()?,
            config,
            stats: Arc::new(Mutex::new(OrchestratorStats::default())),
        })
    }

    /// Complexity tier the ladder will use for `text`.
    #[must_use]
    pub fn complexity(&self, text: &str) -> Complexity {
        self.detector.detect_complexity(text)
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> OrchestratorStats {
        *self.stats.lock()
    }

    /// Produce a structured explanation for `text`.
    ///
    /// Non-conforming model output is never an error: it moves the run to
    /// the next tier, ending with a degraded explanation if needed.
    ///
    /// # Errors
    /// Returns [`LlmError::GenerationUnavailable`] as soon as any model
    /// call fails at the transport level.
    pub async fn explain(&self, text: &str, cancel: &CancellationToken) -> Result<ExplainOutcome> {
        let complexity = self.detector.detect_complexity(text);
        self.stats.lock().runs += 1;

        let mut state = State::Idle;
        let mut attempts: Vec<GenerationAttempt> = Vec::new();
        let mut parsed: Option<StructuredExplanation> = None;

        loop {
            match state {
                State::Idle => state = next_state(state, Event::Start),

                State::Attempt(variant) => {
                    if cancel.is_cancelled() {
                        state = next_state(state, Event::CancelRequested);
                        continue;
                    }

                    let (prompt, options) = match variant {
                        PromptVariant::Normal => (
                            self.prompts.build_prompt(text, complexity, false),
                            self.config.options_for(complexity, false),
                        ),
                        PromptVariant::Strict => (
                            self.prompts.build_prompt(text, complexity, true),
                            self.config.options_for(complexity, true),
                        ),
                        PromptVariant::Fallback => (
                            self.prompts.build_fallback_prompt(text),
                            self.config.fallback_options(),
                        ),
                    };

                    debug!(
                        %variant,
                        %complexity,
                        temperature = options.temperature,
                        max_tokens = options.max_tokens,
                        "Requesting generation"
                    );

                    let call = tokio::select! {
                        biased;
                        () = cancel.cancelled() => Err(LlmError::Cancelled),
                        result = self.model.generate(&prompt, &options, cancel) => result,
                    };

                    let generation = match call {
                        Ok(generation) => generation,
                        Err(LlmError::Cancelled) => {
                            state = next_state(state, Event::CancelRequested);
                            continue;
                        }
                        Err(e) => {
                            self.stats.lock().unavailable += 1;
                            warn!(%variant, error = %e, "Generation failed; aborting ladder");
                            return Err(e);
                        }
                    };
                    self.stats.lock().model_calls += 1;

                    parsed = parse_structured(&generation.text);
                    let valid = parsed.is_some();
                    debug!(%variant, valid, elapsed_ms = generation.elapsed_ms, "Attempt finished");
                    attempts.push(GenerationAttempt {
                        variant,
                        raw_output: Some(generation.text),
                        valid,
                        elapsed_ms: generation.elapsed_ms,
                    });

                    let event = if valid { Event::Valid } else { Event::Invalid };
                    state = next_state(state, event);
                }

                State::Done => return Ok(self.finish(parsed.take(), attempts)),

                State::Cancelled => {
                    self.stats.lock().cancelled += 1;
                    info!(attempts_made = attempts.len(), "Explanation cancelled");
                    return Ok(ExplainOutcome::Cancelled {
                        attempts_made: attempts.len(),
                    });
                }
            }
        }
    }

    fn finish(
        &self,
        parsed: Option<StructuredExplanation>,
        attempts: Vec<GenerationAttempt>,
    ) -> ExplainOutcome {
        let elapsed_ms = attempts.iter().map(|a| a.elapsed_ms).sum();
        let was_retried = attempts.len() > 1;
        let degraded = parsed.is_none();

        let explanation = parsed.unwrap_or_else(|| {
            let raw = attempts
                .last()
                .and_then(|a| a.raw_output.as_deref())
                .unwrap_or_default();
            self.degraded_explanation(raw)
        });

        {
            let mut stats = self.stats.lock();
            if was_retried {
                stats.retried += 1;
            } else {
                stats.first_try_valid += 1;
            }
            if degraded {
                stats.degraded += 1;
            }
        }

        if degraded {
            warn!(attempts = attempts.len(), elapsed_ms, "No structured answer; returning degraded explanation");
        } else {
            info!(
                attempts = attempts.len(),
                steps = explanation.steps.len(),
                was_retried,
                elapsed_ms,
                "Explanation ready"
            );
        }

        ExplainOutcome::Done {
            explanation,
            was_retried: was_retried || degraded,
            degraded,
            elapsed_ms,
            attempts,
        }
    }

    fn degraded_explanation(&self, raw: &str) -> StructuredExplanation {
        let raw = raw.trim();
        let final_answer = if raw.is_empty() {
            self.config.degraded_notice.clone()
        } else {
            format!("{}\n{raw}", self.config.degraded_notice)
        };
        StructuredExplanation {
            steps: Vec::new(),
            verification: None,
            final_answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_walks_all_tiers_on_invalid() {
        let mut state = next_state(State::Idle, Event::Start);
        assert_eq!(state, State::Attempt(PromptVariant::Normal));
        state = next_state(state, Event::Invalid);
        assert_eq!(state, State::Attempt(PromptVariant::Strict));
        state = next_state(state, Event::Invalid);
        assert_eq!(state, State::Attempt(PromptVariant::Fallback));
        state = next_state(state, Event::Invalid);
        assert_eq!(state, State::Done);
    }

    #[test]
    fn valid_output_ends_at_any_tier() {
        for variant in [PromptVariant::Normal, PromptVariant::Strict, PromptVariant::Fallback] {
            assert_eq!(next_state(State::Attempt(variant), Event::Valid), State::Done);
        }
    }

    #[test]
    fn cancel_from_any_live_state() {
        assert_eq!(next_state(State::Idle, Event::CancelRequested), State::Cancelled);
        assert_eq!(
            next_state(State::Attempt(PromptVariant::Strict), Event::CancelRequested),
            State::Cancelled
        );
    }

    #[test]
    fn terminal_states_absorb_events() {
        for event in [Event::Start, Event::Valid, Event::Invalid, Event::CancelRequested] {
            assert_eq!(next_state(State::Done, event), State::Done);
            assert_eq!(next_state(State::Cancelled, event), State::Cancelled);
        }
    }

    #[test]
    fn nonsensical_events_leave_state_unchanged() {
        assert_eq!(next_state(State::Idle, Event::Valid), State::Idle);
        assert_eq!(
            next_state(State::Attempt(PromptVariant::Normal), Event::Start),
            State::Attempt(PromptVariant::Normal)
        );
    }
}
