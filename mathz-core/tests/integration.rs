//! Integration Tests: End-to-End Intake Flows
//!
//! Classify → register → reorganize → delete, against a file-backed store,
//! checking that no problem is ever left without a collection.

use mathz_core::collections::{CollectionManager, CollectionUpdate, NewCollection};
use mathz_core::config::{ClassifierConfig, CollectionConfig, PersistenceConfig};
use mathz_core::types::{Category, ProblemId, ProblemRecord};
use mathz_core::{CachedClassifier, Classifier, MathzError, SqliteStore};

fn classifier() -> CachedClassifier {
    let config = ClassifierConfig::default();
    CachedClassifier::new(Classifier::new(&config).expect("classifier"), config.cache_capacity)
}

fn record(classifier: &CachedClassifier, text: &str) -> ProblemRecord {
    ProblemRecord {
        id: ProblemId::new(),
        text: text.to_string(),
        classification: classifier.classify(text),
        explanation: None,
        was_retried: false,
        created_at: chrono::Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Full lifecycle
// ---------------------------------------------------------------------------

#[test]
fn full_collection_lifecycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lifecycle.db");
    let mut store = SqliteStore::open(&path, &PersistenceConfig::default()).expect("open");
    let manager = CollectionManager::new(CollectionConfig::default());
    let classifier = classifier();

    // 1. Seed and create user collections
    let default = manager.seed_defaults(&mut store).expect("seed");
    let algebra = manager
        .create(&mut store, NewCollection::named("Álgebra"))
        .expect("algebra");
    let review = manager
        .create(&mut store, NewCollection::named("Revisão"))
        .expect("review");

    // 2. Register classified problems
    let linear = record(&classifier, "Resolva a equação: 2x + 5 = 13");
    let trig = record(&classifier, "Calcule sen(30°) em um triângulo retângulo");
    let loose = record(&classifier, "Qual é o valor de 15% de R$ 200?");
    assert_eq!(linear.classification.category, Category::LinearAlgebra);
    assert_eq!(trig.classification.category, Category::TrigonometricFunctions);

    manager.register_problem(&mut store, &linear, &[algebra.id]).expect("linear");
    manager
        .register_problem(&mut store, &trig, &[algebra.id, review.id])
        .expect("trig");
    manager.register_problem(&mut store, &loose, &[]).expect("loose");

    // 3. Rename a user collection
    let renamed = manager
        .update(
            &mut store,
            algebra.id,
            CollectionUpdate {
                name: Some("Álgebra Linear".into()),
                ..CollectionUpdate::default()
            },
        )
        .expect("rename");
    assert_eq!(renamed.name, "Álgebra Linear");

    // 4. Delete it: linear migrates, trig keeps review
    let report = manager.delete(&mut store, algebra.id).expect("delete");
    assert_eq!(report.problems_migrated, 1);
    assert_eq!(report.problems_detached, 1);

    assert_eq!(store.collections_of(linear.id).expect("of"), vec![default.id]);
    assert_eq!(store.collections_of(trig.id).expect("of"), vec![review.id]);
    assert_eq!(store.orphaned_problem_count().expect("orphans"), 0);

    // 5. Reopen and verify everything persisted
    drop(store);
    let mut reopened = SqliteStore::open(&path, &PersistenceConfig::default()).expect("reopen");
    let summaries = manager.list(&mut reopened).expect("list");
    let default_summary = summaries
        .iter()
        .find(|s| s.collection.is_default)
        .expect("default present");
    assert_eq!(default_summary.problem_count, 2);

    let loaded = reopened.load_problem(trig.id).expect("load").expect("Some");
    assert_eq!(loaded.classification, trig.classification);
}

// ---------------------------------------------------------------------------
// Protected collections survive any delete attempt
// ---------------------------------------------------------------------------

#[test]
fn default_collection_cannot_be_deleted() {
    let mut store = SqliteStore::open_in_memory(&PersistenceConfig::default()).expect("open");
    let manager = CollectionManager::new(CollectionConfig::default());
    let default = manager.seed_defaults(&mut store).expect("seed");

    let before = manager.list(&mut store).expect("list");
    let err = manager.delete(&mut store, default.id).expect_err("protected");
    assert!(matches!(err, MathzError::ProtectedCollection { .. }));
    let after = manager.list(&mut store).expect("list");
    assert_eq!(before.len(), after.len());
}

// ---------------------------------------------------------------------------
// Unseeded stores refuse to place problems
// ---------------------------------------------------------------------------

#[test]
fn unseeded_store_reports_missing_default() {
    let mut store = SqliteStore::open_in_memory(&PersistenceConfig::default()).expect("open");
    let manager = CollectionManager::new(CollectionConfig::default());
    let classifier = classifier();
    let problem = record(&classifier, "1 + 1");

    let err = manager
        .register_problem(&mut store, &problem, &[])
        .expect_err("no default");
    assert!(matches!(err, MathzError::MissingDefaultCollection));
    assert_eq!(store.problem_count().expect("count"), 0);
}

// ---------------------------------------------------------------------------
// Configuration flows into behavior
// ---------------------------------------------------------------------------

#[test]
fn configured_default_name_is_used_for_seeding() {
    let config = mathz_core::MathzConfig::from_toml(
        r#"
        [collections]
        default_name = "Caixa de Entrada"
        max_name_chars = 10
        "#,
    )
    .expect("config");
    let mut store = SqliteStore::open_in_memory(&config.persistence).expect("open");
    let manager = CollectionManager::new(config.collections);

    let default = manager.seed_defaults(&mut store).expect("seed");
    assert_eq!(default.name, "Caixa de Entrada");

    let too_long = manager.create(&mut store, NewCollection::named("Nome comprido"));
    assert!(matches!(too_long, Err(MathzError::Validation { .. })));
}
