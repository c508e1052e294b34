//! Intake pipeline: raw text in, classified and explained problem out.
//!
//! ```text
//! text ──► CachedClassifier ──► metadata ─┐
//!   │                                      ├──► ProblemRecord ──► CollectionManager ──► SqliteStore
//!   └────► Orchestrator ──► explanation ──┘
//! ```
//!
//! The classifier and orchestrator run without touching storage; the
//! store lock is taken only for short synchronous sections and never
//! held across a model call.

use std::sync::Arc;

use chrono::Utc;
use mathz_core::collections::{CollectionManager, CollectionTx, DeleteReport, NewCollection};
use mathz_core::{
    CachedClassifier, ClassificationResult, Classifier, Collection, CollectionId,
    CollectionStore, CollectionSummary, MathzError, ProblemId, ProblemRecord, SqliteStore,
};
use mathz_llm::{ExplainOutcome, GenerativeModel, Orchestrator};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::error::{IntakeError, Result};

/// Result of [`IntakePipeline::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The problem was explained and persisted.
    Stored {
        /// The stored record.
        problem: ProblemRecord,
        /// Collections it was placed in.
        collections: Vec<CollectionId>,
        /// Whether the explanation is the answer-only fallback.
        degraded: bool,
    },
    /// The caller cancelled; nothing was persisted.
    Cancelled {
        /// Model calls completed before cancellation.
        attempts_made: usize,
    },
}

/// Composition of classifier, orchestrator and collection store.
pub struct IntakePipeline {
    classifier: CachedClassifier,
    orchestrator: Orchestrator,
    manager: CollectionManager,
    store: Mutex<SqliteStore>,
}

impl std::fmt::Debug for IntakePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakePipeline")
            .field("classifier", &self.classifier)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl IntakePipeline {
    /// Assemble a pipeline and seed the store's system collections.
    ///
    /// # Errors
    /// Returns a storage error if seeding fails.
    pub fn new(
        classifier: CachedClassifier,
        orchestrator: Orchestrator,
        manager: CollectionManager,
        mut store: SqliteStore,
    ) -> Result<Self> {
        manager.seed_defaults(&mut store)?;
        Ok(Self {
            classifier,
            orchestrator,
            manager,
            store: Mutex::new(store),
        })
    }

    /// Build everything from configuration, opening the configured database.
    ///
    /// # Errors
    /// Returns an error if the classifier, orchestrator or store cannot be
    /// constructed.
    pub fn from_config(config: &AppConfig, model: Arc<dyn GenerativeModel>) -> Result<Self> {
        let store = SqliteStore::open(&config.core.persistence.path, &config.core.persistence)?;
        Self::with_store(config, model, store)
    }

    /// Like [`from_config`](Self::from_config) but with a caller-supplied store.
    ///
    /// # Errors
    /// Returns an error if the classifier or orchestrator cannot be built.
    pub fn with_store(
        config: &AppConfig,
        model: Arc<dyn GenerativeModel>,
        store: SqliteStore,
    ) -> Result<Self> {
        let classifier = Classifier::new(&config.core.classifier)?;
        let classifier = CachedClassifier::new(classifier, config.core.classifier.cache_capacity);
        let orchestrator = Orchestrator::new(model, config.llm.clone())?;
        let manager = CollectionManager::new(config.core.collections.clone());
        Self::new(classifier, orchestrator, manager, store)
    }

    /// Classify without generating or persisting anything.
    #[must_use]
    pub fn classify(&self, text: &str) -> ClassificationResult {
        self.classifier.classify(text)
    }

    /// Explain without persisting anything.
    ///
    /// # Errors
    /// `EmptyProblem`, or `GenerationUnavailable` from the model.
    pub async fn explain(&self, text: &str, cancel: &CancellationToken) -> Result<ExplainOutcome> {
        let text = non_empty(text)?;
        Ok(self.orchestrator.explain(text, cancel).await?)
    }

    /// Classify, explain and persist a problem.
    ///
    /// An empty `collections` slice files the problem under the default
    /// collection. Targets are checked before the model is called, so an
    /// unknown collection costs no generation.
    ///
    /// The store is not locked while the model runs. A target deleted in
    /// that window is dropped from the placement; if none survive, the
    /// problem lands in the default collection rather than discarding the
    /// explanation. The returned `collections` list where it actually went.
    ///
    /// # Errors
    /// `EmptyProblem`, `CollectionNotFound`, `GenerationUnavailable`, or a
    /// storage error. Nothing is persisted on error or cancellation.
    #[instrument(skip_all, fields(chars = text.len(), targets = collections.len()))]
    pub async fn submit(
        &self,
        text: &str,
        collections: &[CollectionId],
        cancel: &CancellationToken,
    ) -> Result<Submission> {
        let text = non_empty(text)?;
        self.check_collections(collections)?;

        let classification = self.classifier.classify(text);
        let outcome = self.orchestrator.explain(text, cancel).await?;

        let (explanation, was_retried, degraded) = match outcome {
            ExplainOutcome::Done {
                explanation,
                was_retried,
                degraded,
                ..
            } => (explanation, was_retried, degraded),
            ExplainOutcome::Cancelled { attempts_made } => {
                return Ok(Submission::Cancelled { attempts_made });
            }
        };

        let problem = ProblemRecord {
            id: ProblemId::new(),
            text: text.to_string(),
            classification,
            explanation: Some(explanation),
            was_retried,
            created_at: Utc::now(),
        };

        let placed = {
            let mut store = self.store.lock();
            let targets = surviving_targets(&mut store, collections)?;
            self.manager.register_problem(&mut *store, &problem, &targets)?
        };

        info!(
            problem = %problem.id,
            category = %problem.classification.category,
            difficulty = problem.classification.difficulty_level,
            degraded,
            "Problem stored"
        );

        Ok(Submission::Stored {
            problem,
            collections: placed,
            degraded,
        })
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    /// All collections with problem counts.
    ///
    /// # Errors
    /// Returns a storage error if the query fails.
    pub fn collections(&self) -> Result<Vec<CollectionSummary>> {
        Ok(self.manager.list(&mut *self.store.lock())?)
    }

    /// Create a user collection.
    ///
    /// # Errors
    /// `Validation` for bad input, or a storage error.
    pub fn create_collection(&self, request: NewCollection) -> Result<Collection> {
        Ok(self.manager.create(&mut *self.store.lock(), request)?)
    }

    /// Delete a collection, migrating its sole members to the default one.
    ///
    /// # Errors
    /// `ProtectedCollection`, `CollectionNotFound`, or
    /// `MigrationTransactionFailure`.
    pub fn delete_collection(&self, id: CollectionId) -> Result<DeleteReport> {
        Ok(self.manager.delete(&mut *self.store.lock(), id)?)
    }

    /// Look up a collection by name, case-insensitively.
    ///
    /// # Errors
    /// Returns a storage error if the query fails.
    pub fn find_collection(&self, name: &str) -> Result<Option<Collection>> {
        let mut store = self.store.lock();
        Ok(store.run_in_transaction(|tx| tx.find_collection_by_name(name))?)
    }

    /// Run `f` with exclusive access to the store.
    pub fn with_store_mut<T>(&self, f: impl FnOnce(&mut SqliteStore) -> T) -> T {
        f(&mut *self.store.lock())
    }

    /// The orchestrator, for stats and complexity queries.
    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    fn check_collections(&self, collections: &[CollectionId]) -> Result<()> {
        if collections.is_empty() {
            return Ok(());
        }
        let mut store = self.store.lock();
        store.run_in_transaction(|tx: &mut dyn CollectionTx| {
            for id in collections {
                if tx.find_collection(*id)?.is_none() {
                    return Err(MathzError::CollectionNotFound(*id));
                }
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// Requested targets that still exist. Must run under the same lock as
/// the registration that uses them.
fn surviving_targets(
    store: &mut SqliteStore,
    requested: &[CollectionId],
) -> Result<Vec<CollectionId>> {
    let surviving = store.run_in_transaction(|tx: &mut dyn CollectionTx| {
        let mut surviving = Vec::with_capacity(requested.len());
        for id in requested {
            if tx.find_collection(*id)?.is_some() {
                surviving.push(*id);
            }
        }
        Ok(surviving)
    })?;
    if surviving.len() < requested.len() {
        warn!(
            requested = requested.len(),
            surviving = surviving.len(),
            "Target collections deleted during generation"
        );
    }
    Ok(surviving)
}

fn non_empty(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(IntakeError::EmptyProblem)
    } else {
        Ok(trimmed)
    }
}
