//! # MATHZ Core Library
//!
//! Problem intake for a math-study assistant. Everything here is
//! deterministic and synchronous; the generative side lives in `mathz-llm`.
//!
//! - **Classifier** turns raw problem text into a category, confidence,
//!   tags and a 1–5 difficulty ([`Classifier`], [`CachedClassifier`]).
//! - **Collections** own the rule that every registered problem belongs to
//!   at least one collection ([`CollectionManager`]).
//! - **Persistence** stores problems, collections and memberships in SQLite
//!   ([`SqliteStore`]).
//!
//! ## Performance Contract
//!
//! - Classification: < 200μs for a typical problem statement
//! - Cached classification: < 5μs
//! - Collection delete with migration: one transaction, linear in members

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod classifier;
pub mod collections;
pub mod config;
pub mod error;
pub mod persistence;
pub mod types;

pub use cache::{CacheStats, CachedClassifier};
pub use classifier::Classifier;
pub use collections::{CollectionManager, CollectionStore, CollectionTx, DeleteReport};
pub use config::MathzConfig;
pub use error::MathzError;
pub use persistence::SqliteStore;
pub use types::*;
