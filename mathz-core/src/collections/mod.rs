//! Collection lifecycle: creation, editing, membership and deletion.
//!
//! Invariant: once a problem is registered it belongs to at least one
//! collection. Every multi-row membership mutation goes through
//! [`CollectionManager`], inside a single storage transaction, so the
//! invariant holds at every commit point.
//!
//! Deleting a collection splits its members in two:
//!
//! ```text
//! sole member of target    → gains an edge to the default collection
//! member elsewhere as well → just loses the target edge
//! ```
//!
//! then removes the collection row. Any failure rolls back all three steps.

pub mod store;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::CollectionConfig;
use crate::error::{MathzError, Result};
use crate::types::{Collection, CollectionId, CollectionSummary, ProblemId, ProblemRecord};

pub use store::{CollectionStore, CollectionTx};

const FALLBACK_COLOR: &str = "#4F46E5";
const FALLBACK_ICON: &str = "folder";
const DEFAULT_ICON: &str = "inbox";
const FAVORITES_ICON: &str = "star";
const FAVORITES_COLOR: &str = "#F59E0B";

/// Request to create a user collection.
#[derive(Debug, Clone, Default)]
pub struct NewCollection {
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: String,
    /// Hex color; assigned from the palette when `None`.
    pub color: Option<String>,
    /// Icon name; assigned from the icon set when `None`.
    pub icon: Option<String>,
}

impl NewCollection {
    /// A collection with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update of a collection. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct CollectionUpdate {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New color.
    pub color: Option<String>,
    /// New icon.
    pub icon: Option<String>,
}

/// Outcome of deleting a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    /// Name of the deleted collection.
    pub collection: String,
    /// Problems moved into the default collection.
    pub problems_migrated: usize,
    /// Problems that only lost the deleted edge.
    pub problems_detached: usize,
}

/// Outcome of removing a single membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipRemoval {
    /// The edge did not exist.
    NotMember,
    /// The edge was removed; the problem still has other memberships.
    Removed,
    /// It was the last edge, so the problem now lives in the default collection.
    MovedToDefault,
}

/// Owner of the "every problem has ≥1 collection" invariant.
#[derive(Debug, Clone)]
pub struct CollectionManager {
    config: CollectionConfig,
}

impl CollectionManager {
    /// Create a manager with the given limits and palettes.
    #[must_use]
    pub fn new(config: CollectionConfig) -> Self {
        Self { config }
    }

    /// Seed the default and favorites collections if missing.
    ///
    /// Idempotent. Returns the default collection.
    ///
    /// # Errors
    /// Returns a storage error if the transaction fails.
    pub fn seed_defaults<S: CollectionStore>(&self, store: &mut S) -> Result<Collection> {
        store.run_in_transaction(|tx| {
            let default = if let Some(existing) = tx.default_collection()? {
                existing
            } else {
                let collection = Collection {
                    id: CollectionId::new(),
                    name: self.config.default_name.clone(),
                    description: "Problemas sem outra coleção".to_string(),
                    color: FALLBACK_COLOR.to_string(),
                    icon: DEFAULT_ICON.to_string(),
                    is_system: true,
                    is_default: true,
                    created_at: Utc::now(),
                };
                tx.insert_collection(&collection)?;
                info!(name = %collection.name, "Seeded default collection");
                collection
            };

            if tx.find_collection_by_name(&self.config.favorites_name)?.is_none() {
                let favorites = Collection {
                    id: CollectionId::new(),
                    name: self.config.favorites_name.clone(),
                    description: String::new(),
                    color: FAVORITES_COLOR.to_string(),
                    icon: FAVORITES_ICON.to_string(),
                    is_system: true,
                    is_default: false,
                    created_at: Utc::now(),
                };
                tx.insert_collection(&favorites)?;
                info!(name = %favorites.name, "Seeded favorites collection");
            }

            Ok(default)
        })
    }

    /// Create a user (non-system) collection.
    ///
    /// # Errors
    /// `Validation` for an empty, too long or duplicate name, a too long
    /// description, or a malformed color; storage errors otherwise.
    pub fn create<S: CollectionStore>(
        &self,
        store: &mut S,
        request: NewCollection,
    ) -> Result<Collection> {
        let name = self.validate_name(&request.name)?;
        self.validate_description(&request.description)?;
        if let Some(color) = &request.color {
            validate_color(color)?;
        }

        store.run_in_transaction(|tx| {
            if tx.find_collection_by_name(&name)?.is_some() {
                return Err(MathzError::validation(
                    "name",
                    format!("a collection named '{name}' already exists"),
                ));
            }

            let slot = tx.list_collections()?.len();
            let collection = Collection {
                id: CollectionId::new(),
                name,
                description: request.description.trim().to_string(),
                color: request.color.unwrap_or_else(|| self.palette_color(slot)),
                icon: request.icon.unwrap_or_else(|| self.palette_icon(slot)),
                is_system: false,
                is_default: false,
                created_at: Utc::now(),
            };
            tx.insert_collection(&collection)?;
            debug!(id = %collection.id, name = %collection.name, "Created collection");
            Ok(collection)
        })
    }

    /// Rename, re-describe, recolor or re-icon a collection.
    ///
    /// System collections may change color and icon but keep their name.
    ///
    /// # Errors
    /// `CollectionNotFound`, `Validation`, or storage errors.
    pub fn update<S: CollectionStore>(
        &self,
        store: &mut S,
        id: CollectionId,
        update: CollectionUpdate,
    ) -> Result<Collection> {
        let name = update.name.as_deref().map(|n| self.validate_name(n)).transpose()?;
        if let Some(description) = &update.description {
            self.validate_description(description)?;
        }
        if let Some(color) = &update.color {
            validate_color(color)?;
        }

        store.run_in_transaction(|tx| {
            let mut collection = tx
                .find_collection(id)?
                .ok_or(MathzError::CollectionNotFound(id))?;

            if let Some(name) = name
                && name != collection.name
            {
                if collection.is_system {
                    return Err(MathzError::validation(
                        "name",
                        "system collections cannot be renamed",
                    ));
                }
                if let Some(other) = tx.find_collection_by_name(&name)?
                    && other.id != id
                {
                    return Err(MathzError::validation(
                        "name",
                        format!("a collection named '{name}' already exists"),
                    ));
                }
                collection.name = name;
            }
            if let Some(description) = update.description {
                collection.description = description.trim().to_string();
            }
            if let Some(color) = update.color {
                collection.color = color;
            }
            if let Some(icon) = update.icon {
                collection.icon = icon;
            }

            tx.update_collection(&collection)?;
            Ok(collection)
        })
    }

    /// All collections with problem counts.
    ///
    /// # Errors
    /// Returns a storage error if the query fails.
    pub fn list<S: CollectionStore>(&self, store: &mut S) -> Result<Vec<CollectionSummary>> {
        store.run_in_transaction(|tx| tx.list_collections())
    }

    /// Persist a new problem and its memberships atomically.
    ///
    /// An empty `collections` slice places the problem in the default
    /// collection.
    ///
    /// # Errors
    /// `CollectionNotFound` if any target is unknown, `MissingDefaultCollection`
    /// if the store was never seeded, or storage errors.
    pub fn register_problem<S: CollectionStore>(
        &self,
        store: &mut S,
        problem: &ProblemRecord,
        collections: &[CollectionId],
    ) -> Result<Vec<CollectionId>> {
        store.run_in_transaction(|tx| {
            tx.insert_problem(problem)?;
            let targets = resolve_targets(tx, collections)?;
            for target in &targets {
                tx.insert_membership(problem.id, *target)?;
            }
            debug!(problem = %problem.id, collections = targets.len(), "Registered problem");
            Ok(targets)
        })
    }

    /// Add an existing problem to more collections.
    ///
    /// Returns how many new edges were created. An empty slice ensures
    /// membership in the default collection.
    ///
    /// # Errors
    /// `ProblemNotFound`, `CollectionNotFound`, or storage errors.
    pub fn assign<S: CollectionStore>(
        &self,
        store: &mut S,
        problem: ProblemId,
        collections: &[CollectionId],
    ) -> Result<usize> {
        store.run_in_transaction(|tx| {
            if !tx.problem_exists(problem)? {
                return Err(MathzError::ProblemNotFound(problem));
            }
            let mut added = 0;
            for target in resolve_targets(tx, collections)? {
                if tx.insert_membership(problem, target)? {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    /// Remove a problem from one collection without ever orphaning it.
    ///
    /// # Errors
    /// `ProblemNotFound`, `MissingDefaultCollection`, or storage errors.
    pub fn remove_membership<S: CollectionStore>(
        &self,
        store: &mut S,
        problem: ProblemId,
        collection: CollectionId,
    ) -> Result<MembershipRemoval> {
        store.run_in_transaction(|tx| {
            if !tx.problem_exists(problem)? {
                return Err(MathzError::ProblemNotFound(problem));
            }
            let others = tx.count_other_memberships(problem, collection)?;
            if others == 0 {
                let default =
                    tx.default_collection()?.ok_or(MathzError::MissingDefaultCollection)?;
                if default.id == collection {
                    return Err(MathzError::validation(
                        "collection",
                        "a problem with no other collection must stay in the default one",
                    ));
                }
                if !tx.delete_membership(problem, collection)? {
                    return Ok(MembershipRemoval::NotMember);
                }
                tx.insert_membership(problem, default.id)?;
                return Ok(MembershipRemoval::MovedToDefault);
            }

            if tx.delete_membership(problem, collection)? {
                Ok(MembershipRemoval::Removed)
            } else {
                Ok(MembershipRemoval::NotMember)
            }
        })
    }

    /// Delete a non-protected collection, migrating sole members to the
    /// default collection.
    ///
    /// # Errors
    /// `ProtectedCollection` for the default or another system collection,
    /// `CollectionNotFound` for an unknown ID, and
    /// `MigrationTransactionFailure` if anything fails mid-way (after which
    /// the store is exactly as it was).
    pub fn delete<S: CollectionStore>(
        &self,
        store: &mut S,
        id: CollectionId,
    ) -> Result<DeleteReport> {
        let result = store.run_in_transaction(|tx| {
            let target = tx
                .find_collection(id)?
                .ok_or(MathzError::CollectionNotFound(id))?;
            if target.is_protected() {
                return Err(MathzError::ProtectedCollection { name: target.name });
            }
            let default = tx.default_collection()?.ok_or(MathzError::MissingDefaultCollection)?;

            let mut migrated = 0;
            let mut detached = 0;
            for problem in tx.problems_in(id)? {
                if tx.count_other_memberships(problem, id)? == 0 {
                    tx.insert_membership(problem, default.id)?;
                    migrated += 1;
                } else {
                    detached += 1;
                }
                tx.delete_membership(problem, id)?;
            }
            tx.delete_collection(id)?;

            Ok(DeleteReport {
                collection: target.name,
                problems_migrated: migrated,
                problems_detached: detached,
            })
        });

        match result {
            Ok(report) => {
                info!(
                    collection = %report.collection,
                    migrated = report.problems_migrated,
                    detached = report.problems_detached,
                    "Deleted collection"
                );
                Ok(report)
            }
            Err(
                e @ (MathzError::ProtectedCollection { .. }
                | MathzError::CollectionNotFound(_)
                | MathzError::MissingDefaultCollection),
            ) => Err(e),
            Err(e) => {
                warn!(collection = %id, error = %e, "Collection delete rolled back");
                Err(MathzError::MigrationTransactionFailure(Box::new(e)))
            }
        }
    }

    fn validate_name(&self, name: &str) -> Result<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(MathzError::validation("name", "must not be empty"));
        }
        let len = trimmed.chars().count();
        if len > self.config.max_name_chars {
            return Err(MathzError::validation(
                "name",
                format!("{len} chars (max: {})", self.config.max_name_chars),
            ));
        }
        Ok(trimmed.to_string())
    }

    fn validate_description(&self, description: &str) -> Result<()> {
        let len = description.trim().chars().count();
        if len > self.config.max_description_chars {
            return Err(MathzError::validation(
                "description",
                format!("{len} chars (max: {})", self.config.max_description_chars),
            ));
        }
        Ok(())
    }

    fn palette_color(&self, slot: usize) -> String {
        pick(&self.config.palette, slot).unwrap_or_else(|| FALLBACK_COLOR.to_string())
    }

    fn palette_icon(&self, slot: usize) -> String {
        pick(&self.config.icons, slot).unwrap_or_else(|| FALLBACK_ICON.to_string())
    }
}

fn pick(options: &[String], slot: usize) -> Option<String> {
    if options.is_empty() {
        None
    } else {
        Some(options[slot % options.len()].clone())
    }
}

fn validate_color(color: &str) -> Result<()> {
    let hex = color.strip_prefix('#').unwrap_or("");
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(MathzError::validation("color", format!("'{color}' is not #RRGGBB")))
    }
}

/// Validate explicit targets, or fall back to the default collection.
fn resolve_targets(tx: &dyn CollectionTx, requested: &[CollectionId]) -> Result<Vec<CollectionId>> {
    if requested.is_empty() {
        let default = tx.default_collection()?.ok_or(MathzError::MissingDefaultCollection)?;
        return Ok(vec![default.id]);
    }
    let mut targets = Vec::with_capacity(requested.len());
    for id in requested {
        if tx.find_collection(*id)?.is_none() {
            return Err(MathzError::CollectionNotFound(*id));
        }
        if !targets.contains(id) {
            targets.push(*id);
        }
    }
    Ok(targets)
}
