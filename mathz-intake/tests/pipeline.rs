//! End-to-end intake: classify → explain → persist, with a canned model
//! and an in-memory store.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use mathz_core::collections::NewCollection;
use mathz_core::config::PersistenceConfig;
use mathz_core::{Category, CollectionId, MathzError, SqliteStore};
use mathz_intake::{AppConfig, IntakeError, IntakePipeline, Submission};
use mathz_llm::error::Result as LlmResult;
use mathz_llm::{Generation, GenerationOptions, GenerativeModel, LlmError};

const VALID: &str = "PASSO 1:\nTítulo: Isolar x\nExplicação: subtraia 5 dos dois lados\nCálculo: 2x = 8\nResultado: x = 4\nVERIFICAÇÃO: 2·4 + 5 = 13\nRESPOSTA FINAL: x = 4";
const EQUATION: &str = "Resolva a equação: 2x + 5 = 13";

struct CannedModel {
    replies: Mutex<VecDeque<LlmResult<String>>>,
    calls: AtomicUsize,
}

impl CannedModel {
    fn new(replies: impl IntoIterator<Item = LlmResult<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn valid() -> Arc<Self> {
        Self::new((0..8).map(|_| Ok(VALID.to_string())))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeModel for CannedModel {
    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
        _cancel: &CancellationToken,
    ) -> LlmResult<Generation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().pop_front().unwrap_or(Ok(String::new()));
        reply.map(|text| Generation { text, elapsed_ms: 3 })
    }
}

/// Blocks inside `generate` until the test releases it.
#[derive(Default)]
struct GatedModel {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl GenerativeModel for GatedModel {
    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
        _cancel: &CancellationToken,
    ) -> LlmResult<Generation> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Generation {
            text: VALID.to_string(),
            elapsed_ms: 3,
        })
    }
}

fn pipeline_with(model: Arc<dyn GenerativeModel>) -> IntakePipeline {
    let config = AppConfig::default();
    let store = SqliteStore::open_in_memory(&PersistenceConfig::default()).expect("store");
    IntakePipeline::with_store(&config, model, store).expect("pipeline")
}

fn pipeline(model: &Arc<CannedModel>) -> IntakePipeline {
    pipeline_with(model.clone())
}

fn stored_count(pipeline: &IntakePipeline) -> usize {
    pipeline.with_store_mut(|store| store.problem_count().expect("count"))
}

#[tokio::test]
async fn submit_files_problem_under_default_collection() {
    let model = CannedModel::valid();
    let pipeline = pipeline(&model);

    let submission = pipeline
        .submit(EQUATION, &[], &CancellationToken::new())
        .await
        .expect("submit");

    let Submission::Stored {
        problem,
        collections,
        degraded,
    } = submission
    else {
        panic!("expected Stored");
    };
    assert!(!degraded);
    assert_eq!(model.calls(), 1);
    assert_eq!(problem.classification.category, Category::LinearAlgebra);
    assert_eq!(collections.len(), 1);

    let default = pipeline
        .collections()
        .expect("list")
        .into_iter()
        .find(|s| s.collection.is_default)
        .expect("default collection");
    assert_eq!(default.collection.id, collections[0]);
    assert_eq!(default.problem_count, 1);

    let loaded = pipeline
        .with_store_mut(|store| store.load_problem(problem.id))
        .expect("load")
        .expect("stored problem");
    assert_eq!(loaded.text, EQUATION);
    assert_eq!(
        loaded.explanation.map(|e| e.final_answer),
        Some("x = 4".to_string())
    );
}

#[tokio::test]
async fn submit_into_named_collection_then_delete_migrates() {
    let model = CannedModel::valid();
    let pipeline = pipeline(&model);
    let exams = pipeline
        .create_collection(NewCollection::named("Provas"))
        .expect("create");

    let Submission::Stored { problem, .. } = pipeline
        .submit(EQUATION, &[exams.id], &CancellationToken::new())
        .await
        .expect("submit")
    else {
        panic!("expected Stored");
    };

    let report = pipeline.delete_collection(exams.id).expect("delete");
    assert_eq!(report.problems_migrated, 1);
    assert_eq!(report.problems_detached, 0);

    let memberships = pipeline
        .with_store_mut(|store| store.collections_of(problem.id))
        .expect("memberships");
    assert_eq!(memberships.len(), 1);
    assert!(pipeline.find_collection("provas").expect("lookup").is_none());
}

#[tokio::test]
async fn find_collection_ignores_case() {
    let pipeline = pipeline(&CannedModel::valid());
    pipeline
        .create_collection(NewCollection::named("Geometria Plana"))
        .expect("create");
    let found = pipeline.find_collection("GEOMETRIA plana").expect("lookup");
    assert_eq!(found.map(|c| c.name), Some("Geometria Plana".to_string()));
}

#[tokio::test]
async fn default_collection_cannot_be_deleted() {
    let pipeline = pipeline(&CannedModel::valid());
    let default = pipeline
        .collections()
        .expect("list")
        .into_iter()
        .find(|s| s.collection.is_default)
        .expect("default");

    let err = pipeline
        .delete_collection(default.collection.id)
        .expect_err("protected");
    assert!(matches!(
        err,
        IntakeError::Core(MathzError::ProtectedCollection { .. })
    ));
}

#[tokio::test]
async fn empty_text_is_rejected_before_generation() {
    let model = CannedModel::valid();
    let pipeline = pipeline(&model);

    let err = pipeline
        .submit("   \n ", &[], &CancellationToken::new())
        .await
        .expect_err("empty");
    assert!(matches!(err, IntakeError::EmptyProblem));
    assert_eq!(model.calls(), 0);
    assert_eq!(stored_count(&pipeline), 0);
}

#[tokio::test]
async fn unknown_collection_is_rejected_before_generation() {
    let model = CannedModel::valid();
    let pipeline = pipeline(&model);

    let err = pipeline
        .submit(EQUATION, &[CollectionId::new()], &CancellationToken::new())
        .await
        .expect_err("unknown collection");
    assert!(matches!(
        err,
        IntakeError::Core(MathzError::CollectionNotFound(_))
    ));
    assert_eq!(model.calls(), 0);
    assert_eq!(stored_count(&pipeline), 0);
}

#[tokio::test]
async fn unavailable_model_persists_nothing() {
    let model = CannedModel::new([Err(LlmError::GenerationUnavailable(
        "connection refused".into(),
    ))]);
    let pipeline = pipeline(&model);

    let err = pipeline
        .submit(EQUATION, &[], &CancellationToken::new())
        .await
        .expect_err("unavailable");
    assert!(matches!(
        err,
        IntakeError::Llm(LlmError::GenerationUnavailable(_))
    ));
    assert_eq!(stored_count(&pipeline), 0);
}

#[tokio::test]
async fn cancelled_submission_persists_nothing() {
    let model = CannedModel::valid();
    let pipeline = pipeline(&model);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let submission = pipeline.submit(EQUATION, &[], &cancel).await.expect("submit");
    assert_eq!(submission, Submission::Cancelled { attempts_made: 0 });
    assert_eq!(model.calls(), 0);
    assert_eq!(stored_count(&pipeline), 0);
}

#[tokio::test]
async fn unparseable_output_is_stored_degraded() {
    let model = CannedModel::new([
        Ok("x = 4".to_string()),
        Ok("a resposta é 4".to_string()),
        Ok("4".to_string()),
    ]);
    let pipeline = pipeline(&model);

    let Submission::Stored {
        problem, degraded, ..
    } = pipeline
        .submit(EQUATION, &[], &CancellationToken::new())
        .await
        .expect("submit")
    else {
        panic!("expected Stored");
    };
    assert!(degraded);
    assert!(problem.was_retried);
    let explanation = problem.explanation.expect("explanation");
    assert!(explanation.steps.is_empty());
    assert!(explanation.final_answer.ends_with('4'));
    assert_eq!(stored_count(&pipeline), 1);
}

#[tokio::test]
async fn target_deleted_during_generation_falls_back_to_default() {
    let model = Arc::new(GatedModel::default());
    let pipeline = pipeline_with(model.clone());
    let drafts = pipeline
        .create_collection(NewCollection::named("Rascunhos"))
        .expect("create");
    let default_id = pipeline
        .collections()
        .expect("list")
        .into_iter()
        .find(|s| s.collection.is_default)
        .expect("default")
        .collection
        .id;

    let cancel = CancellationToken::new();
    let targets = [drafts.id];
    let submit = pipeline.submit(EQUATION, &targets, &cancel);
    let delete = async {
        model.entered.notified().await;
        pipeline.delete_collection(drafts.id).expect("delete");
        model.release.notify_one();
    };
    let (submission, ()) = tokio::join!(submit, delete);

    let Submission::Stored {
        problem,
        collections,
        ..
    } = submission.expect("submit")
    else {
        panic!("expected Stored");
    };
    assert_eq!(collections, vec![default_id]);
    let memberships = pipeline
        .with_store_mut(|store| store.collections_of(problem.id))
        .expect("memberships");
    assert_eq!(memberships, vec![default_id]);
}

#[test]
fn classify_needs_no_model() {
    let model = CannedModel::valid();
    let pipeline = pipeline(&model);
    let result = pipeline.classify("Calcule sen(30°) em um triângulo retângulo");
    assert_eq!(result.category, Category::TrigonometricFunctions);
    assert_eq!(model.calls(), 0);
}
