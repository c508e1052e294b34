//! Storage contract consumed by the collection lifecycle manager.
//!
//! The manager never touches SQL. It asks a [`CollectionStore`] for a
//! transaction and performs all multi-row membership mutations through the
//! [`CollectionTx`] handle it is given. Returning `Err` from the closure
//! must roll back every write made through that handle.

use crate::error::Result;
use crate::types::{Collection, CollectionId, CollectionSummary, ProblemId, ProblemRecord};

/// Operations available inside one all-or-nothing transaction.
pub trait CollectionTx {
    /// Insert a new problem row (memberships are added separately).
    fn insert_problem(&mut self, problem: &ProblemRecord) -> Result<()>;

    /// Whether a problem row exists.
    fn problem_exists(&self, problem: ProblemId) -> Result<bool>;

    /// Look up a collection by ID.
    fn find_collection(&self, id: CollectionId) -> Result<Option<Collection>>;

    /// Look up a collection by name, case-insensitively.
    fn find_collection_by_name(&self, name: &str) -> Result<Option<Collection>>;

    /// The collection flagged `is_default`, if the store has been seeded.
    fn default_collection(&self) -> Result<Option<Collection>>;

    /// Every collection with its problem count, default first then by name.
    fn list_collections(&self) -> Result<Vec<CollectionSummary>>;

    /// Insert a new collection row.
    fn insert_collection(&mut self, collection: &Collection) -> Result<()>;

    /// Overwrite name, description, color and icon of an existing row.
    fn update_collection(&mut self, collection: &Collection) -> Result<()>;

    /// Problems that are members of `collection`.
    fn problems_in(&self, collection: CollectionId) -> Result<Vec<ProblemId>>;

    /// Add a membership edge. Returns `false` if it already existed.
    fn insert_membership(&mut self, problem: ProblemId, collection: CollectionId) -> Result<bool>;

    /// Remove a membership edge. Returns `false` if it did not exist.
    fn delete_membership(&mut self, problem: ProblemId, collection: CollectionId) -> Result<bool>;

    /// Number of memberships `problem` has outside `excluding`.
    fn count_other_memberships(&self, problem: ProblemId, excluding: CollectionId) -> Result<usize>;

    /// Delete a collection row.
    fn delete_collection(&mut self, collection: CollectionId) -> Result<()>;
}

/// A store that can run a closure inside a transaction.
pub trait CollectionStore {
    /// Run `f` atomically: commit if it returns `Ok`, roll back on `Err`.
    ///
    /// # Errors
    /// Returns the closure's error, or a storage error from begin/commit.
    fn run_in_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn CollectionTx) -> Result<T>;
}
