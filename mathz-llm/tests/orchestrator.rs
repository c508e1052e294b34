//! Orchestrator behavior against a scripted model.
//!
//! The mock returns canned replies in order and records every prompt it
//! receives, so each test can assert both the outcome and exactly which
//! calls were made.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use mathz_llm::error::Result;
use mathz_llm::{
    ExplainOutcome, Generation, GenerationOptions, GenerativeModel, LlmConfig, LlmError,
    Orchestrator, PromptVariant,
};

const VALID: &str = "PASSO 1:\nTítulo: Subtrair\nExplicação: tire 5\nCálculo: 2x = 8\nResultado: x = 4\nVERIFICAÇÃO: 2·4 + 5 = 13\nRESPOSTA FINAL: x = 4";
const PROBLEM: &str = "Resolva a equação: 2x + 5 = 13";

#[derive(Debug, Clone)]
enum Reply {
    Text(&'static str),
    Unavailable,
    /// Never answers on its own; only the orchestrator's race can end it.
    Hang,
}

#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<(String, GenerationOptions)>>,
}

impl ScriptedModel {
    fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        _cancel: &CancellationToken,
    ) -> Result<Generation> {
        self.prompts.lock().push((prompt.to_string(), *options));
        let reply = self.replies.lock().pop_front().unwrap_or(Reply::Text(""));
        match reply {
            Reply::Text(text) => Ok(Generation {
                text: text.to_string(),
                elapsed_ms: 7,
            }),
            Reply::Unavailable => Err(LlmError::GenerationUnavailable("connection refused".into())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Generation {
                    text: String::new(),
                    elapsed_ms: 0,
                })
            }
        }
    }
}

fn orchestrator(model: &Arc<ScriptedModel>) -> Orchestrator {
    Orchestrator::new(model.clone(), LlmConfig::default()).expect("orchestrator")
}

// ---------------------------------------------------------------------------
// Ladder
// ---------------------------------------------------------------------------

#[tokio::test]
async fn valid_first_answer_makes_exactly_one_call() {
    let model = ScriptedModel::new([Reply::Text(VALID)]);
    let outcome = orchestrator(&model)
        .explain(PROBLEM, &CancellationToken::new())
        .await
        .expect("explain");

    assert_eq!(model.calls(), 1);
    match outcome {
        ExplainOutcome::Done {
            explanation,
            was_retried,
            degraded,
            elapsed_ms,
            attempts,
        } => {
            assert!(!was_retried);
            assert!(!degraded);
            assert_eq!(elapsed_ms, 7);
            assert_eq!(attempts.len(), 1);
            assert_eq!(explanation.final_answer, "x = 4");
            assert_eq!(explanation.steps.len(), 1);
        }
        other => panic!("expected Done, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_then_valid_uses_strict_prompt() {
    let model = ScriptedModel::new([Reply::Text("x = 4"), Reply::Text(VALID)]);
    let outcome = orchestrator(&model)
        .explain(PROBLEM, &CancellationToken::new())
        .await
        .expect("explain");

    let ExplainOutcome::Done { was_retried, degraded, attempts, .. } = outcome else {
        panic!("expected Done");
    };
    assert!(was_retried);
    assert!(!degraded);
    assert_eq!(
        attempts.iter().map(|a| a.variant).collect::<Vec<_>>(),
        vec![PromptVariant::Normal, PromptVariant::Strict]
    );
    assert!(!attempts[0].valid);
    assert!(attempts[1].valid);

    let prompts = model.prompts.lock();
    assert!(!prompts[0].0.contains("ATENÇÃO"));
    assert!(prompts[1].0.contains("ATENÇÃO"));
    assert!(prompts[1].1.temperature <= prompts[0].1.temperature);
}

#[tokio::test]
async fn all_invalid_degrades_with_nonempty_answer() {
    let model = ScriptedModel::new([
        Reply::Text("não sei"),
        Reply::Text("também não"),
        Reply::Text("x = 4"),
    ]);
    let outcome = orchestrator(&model)
        .explain(PROBLEM, &CancellationToken::new())
        .await
        .expect("unparseable output is never an error");

    assert_eq!(model.calls(), 3);
    let ExplainOutcome::Done { explanation, was_retried, degraded, elapsed_ms, .. } = outcome else {
        panic!("expected Done");
    };
    assert!(was_retried);
    assert!(degraded);
    assert_eq!(elapsed_ms, 21);
    assert!(explanation.steps.is_empty());
    assert!(explanation.final_answer.ends_with("x = 4"));
    assert!(explanation.final_answer.starts_with(&LlmConfig::default().degraded_notice));
}

#[tokio::test]
async fn empty_fallback_still_yields_answer_text() {
    let model = ScriptedModel::new([Reply::Text(""), Reply::Text(""), Reply::Text("   ")]);
    let outcome = orchestrator(&model)
        .explain(PROBLEM, &CancellationToken::new())
        .await
        .expect("explain");
    let explanation = outcome.explanation().expect("done");
    assert!(!explanation.final_answer.trim().is_empty());
}

#[tokio::test]
async fn fallback_prompt_is_answer_only() {
    let model = ScriptedModel::new([Reply::Text("?"), Reply::Text("?"), Reply::Text("4")]);
    orchestrator(&model)
        .explain(PROBLEM, &CancellationToken::new())
        .await
        .expect("explain");
    let prompts = model.prompts.lock();
    assert_eq!(prompts.len(), 3);
    assert!(!prompts[2].0.contains("PASSO"));
    assert_eq!(prompts[2].1.max_tokens, LlmConfig::default().tiers.fallback.max_tokens);
}

// ---------------------------------------------------------------------------
// Transport failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_failure_is_surfaced_immediately() {
    let model = ScriptedModel::new([Reply::Unavailable, Reply::Text(VALID)]);
    let orchestrator = orchestrator(&model);
    let err = orchestrator
        .explain(PROBLEM, &CancellationToken::new())
        .await
        .expect_err("unavailable");

    assert!(matches!(err, LlmError::GenerationUnavailable(_)));
    assert_eq!(model.calls(), 1);
    assert_eq!(orchestrator.stats().unavailable, 1);
}

#[tokio::test]
async fn transport_failure_on_retry_is_not_absorbed() {
    let model = ScriptedModel::new([Reply::Text("x = 4"), Reply::Unavailable]);
    let err = orchestrator(&model)
        .explain(PROBLEM, &CancellationToken::new())
        .await
        .expect_err("unavailable");
    assert!(matches!(err, LlmError::GenerationUnavailable(_)));
    assert_eq!(model.calls(), 2);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_before_start_makes_no_calls() {
    let model = ScriptedModel::new([Reply::Text(VALID)]);
    let token = CancellationToken::new();
    token.cancel();

    let outcome = orchestrator(&model).explain(PROBLEM, &token).await.expect("explain");
    assert_eq!(outcome, ExplainOutcome::Cancelled { attempts_made: 0 });
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn cancel_during_call_stops_the_ladder() {
    let model = ScriptedModel::new([Reply::Text("x = 4"), Reply::Hang, Reply::Text(VALID)]);
    let orchestrator = orchestrator(&model);
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(5), orchestrator.explain(PROBLEM, &token))
        .await
        .expect("cancellation should end the hanging call")
        .expect("explain");

    assert_eq!(outcome, ExplainOutcome::Cancelled { attempts_made: 1 });
    assert_eq!(model.calls(), 2);
    assert_eq!(orchestrator.stats().cancelled, 1);
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stats_accumulate_across_runs() {
    let model = ScriptedModel::new([
        Reply::Text(VALID),
        Reply::Text("?"),
        Reply::Text(VALID),
    ]);
    let orchestrator = orchestrator(&model);
    let token = CancellationToken::new();
    orchestrator.explain(PROBLEM, &token).await.expect("first");
    orchestrator.explain(PROBLEM, &token).await.expect("second");

    let stats = orchestrator.stats();
    assert_eq!(stats.runs, 2);
    assert_eq!(stats.model_calls, 3);
    assert_eq!(stats.first_try_valid, 1);
    assert_eq!(stats.retried, 1);
    assert_eq!(stats.degraded, 0);
}
