//! SQLite persistence layer for MATHZ.
//!
//! ```sql
//! CREATE TABLE collections (
//!     id          TEXT PRIMARY KEY,
//!     name        TEXT NOT NULL,
//!     name_key    TEXT NOT NULL UNIQUE,  -- Unicode-lowercased name
//!     description TEXT NOT NULL,
//!     color       TEXT NOT NULL,
//!     icon        TEXT NOT NULL,
//!     is_system   INTEGER NOT NULL,
//!     is_default  INTEGER NOT NULL,
//!     created_at  TEXT NOT NULL
//! );
//! CREATE TABLE problems (
//!     id             TEXT PRIMARY KEY,
//!     text           TEXT NOT NULL,
//!     category       TEXT NOT NULL,
//!     difficulty     INTEGER NOT NULL,
//!     classification TEXT NOT NULL,      -- JSON
//!     explanation    TEXT,               -- JSON
//!     was_retried    INTEGER NOT NULL,
//!     created_at     TEXT NOT NULL
//! );
//! CREATE TABLE problem_collections (
//!     problem_id    TEXT REFERENCES problems(id)    ON DELETE CASCADE,
//!     collection_id TEXT REFERENCES collections(id) ON DELETE CASCADE,
//!     PRIMARY KEY (problem_id, collection_id)
//! );
//! ```
//!
//! - WAL mode for concurrent reads.
//! - Foreign keys on, so deleting a problem drops its memberships.
//! - A partial unique index allows at most one `is_default` row.
//! - Classification and explanation are JSON text, keeping the schema
//!   stable as those shapes evolve.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collections::{CollectionStore, CollectionTx};
use crate::config::PersistenceConfig;
use crate::error::{MathzError, Result};
use crate::types::{
    ClassificationResult, Collection, CollectionId, CollectionSummary, ProblemId, ProblemRecord,
    StructuredExplanation,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS collections (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    name_key    TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    color       TEXT NOT NULL,
    icon        TEXT NOT NULL,
    is_system   INTEGER NOT NULL DEFAULT 0,
    is_default  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_collections_single_default
    ON collections(is_default) WHERE is_default = 1;

CREATE TABLE IF NOT EXISTS problems (
    id             TEXT PRIMARY KEY,
    text           TEXT NOT NULL,
    category       TEXT NOT NULL,
    difficulty     INTEGER NOT NULL,
    classification TEXT NOT NULL,
    explanation    TEXT,
    was_retried    INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_problems_category ON problems(category);

CREATE TABLE IF NOT EXISTS problem_collections (
    problem_id    TEXT NOT NULL REFERENCES problems(id) ON DELETE CASCADE,
    collection_id TEXT NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    added_at      TEXT NOT NULL,
    PRIMARY KEY (problem_id, collection_id)
);
CREATE INDEX IF NOT EXISTS idx_problem_collections_collection
    ON problem_collections(collection_id);
";

const COLLECTION_COLUMNS: &str =
    "id, name, description, color, icon, is_system, is_default, created_at";

const PROBLEM_COLUMNS: &str =
    "p.id, p.text, p.classification, p.explanation, p.was_retried, p.created_at";

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn json_at<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn collection_from_row(row: &Row<'_>) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: CollectionId(uuid_at(row, 0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        color: row.get(3)?,
        icon: row.get(4)?,
        is_system: row.get(5)?,
        is_default: row.get(6)?,
        created_at: timestamp_at(row, 7)?,
    })
}

fn problem_from_row(row: &Row<'_>) -> rusqlite::Result<ProblemRecord> {
    let explanation: Option<String> = row.get(3)?;
    let explanation = explanation
        .map(|raw| serde_json::from_str::<StructuredExplanation>(&raw))
        .transpose()
        .map_err(|e| conversion_error(3, e))?;
    Ok(ProblemRecord {
        id: ProblemId(uuid_at(row, 0)?),
        text: row.get(1)?,
        classification: json_at::<ClassificationResult>(row, 2)?,
        explanation,
        was_retried: row.get(4)?,
        created_at: timestamp_at(row, 5)?,
    })
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| MathzError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// Handle to an open SQLite database holding problems and collections.
///
/// # Usage
///
/// ```no_run
/// # use mathz_core::persistence::SqliteStore;
/// # use mathz_core::config::{CollectionConfig, PersistenceConfig};
/// # use mathz_core::collections::CollectionManager;
/// let mut store = SqliteStore::open("mathz.db", &PersistenceConfig::default())?;
/// let manager = CollectionManager::new(CollectionConfig::default());
/// let default = manager.seed_defaults(&mut store)?;
/// # Ok::<(), mathz_core::error::MathzError>(())
/// ```
pub struct SqliteStore {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) an SQLite database at `path`.
    ///
    /// The schema is created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`MathzError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
        Self::prepare(&conn)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "MATHZ store opened"
        );

        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`MathzError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::prepare(&conn)?;

        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    fn prepare(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Problems
    // ------------------------------------------------------------------

    /// Load a problem by ID.
    ///
    /// # Errors
    ///
    /// Returns [`MathzError::Database`] on SQLite or decoding failures.
    pub fn load_problem(&self, id: ProblemId) -> Result<Option<ProblemRecord>> {
        let sql = format!("SELECT {PROBLEM_COLUMNS} FROM problems p WHERE p.id = ?1");
        let problem = self
            .conn
            .prepare_cached(&sql)?
            .query_row(params![id.0.to_string()], problem_from_row)
            .optional()?;
        Ok(problem)
    }

    /// Most recent problems first, optionally restricted to one collection.
    ///
    /// # Errors
    ///
    /// Returns [`MathzError::Database`] on SQLite or decoding failures.
    pub fn list_problems(
        &self,
        collection: Option<CollectionId>,
        limit: usize,
    ) -> Result<Vec<ProblemRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = if let Some(collection) = collection {
            let sql = format!(
                "SELECT {PROBLEM_COLUMNS} FROM problems p
                 JOIN problem_collections pc ON pc.problem_id = p.id
                 WHERE pc.collection_id = ?1
                 ORDER BY p.created_at DESC LIMIT ?2"
            );
            let mut stmt = self.conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map(params![collection.0.to_string(), limit], problem_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        } else {
            let sql = format!(
                "SELECT {PROBLEM_COLUMNS} FROM problems p ORDER BY p.created_at DESC LIMIT ?1"
            );
            let mut stmt = self.conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map(params![limit], problem_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        Ok(rows)
    }

    /// Collections a problem belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`MathzError::Database`] on SQLite failures.
    pub fn collections_of(&self, problem: ProblemId) -> Result<Vec<CollectionId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT collection_id FROM problem_collections WHERE problem_id = ?1 ORDER BY added_at",
        )?;
        let ids = stmt
            .query_map(params![problem.0.to_string()], |row| uuid_at(row, 0))?
            .map(|r| r.map(CollectionId))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Replace a problem's stored explanation.
    ///
    /// # Errors
    ///
    /// Returns [`MathzError::ProblemNotFound`] if no row matches, or a
    /// serialization/database error.
    pub fn update_explanation(
        &self,
        problem: ProblemId,
        explanation: &StructuredExplanation,
        was_retried: bool,
    ) -> Result<()> {
        let json = to_json(explanation)?;
        let updated = self.conn.execute(
            "UPDATE problems SET explanation = ?2, was_retried = ?3 WHERE id = ?1",
            params![problem.0.to_string(), json, was_retried],
        )?;
        if updated == 0 {
            return Err(MathzError::ProblemNotFound(problem));
        }
        Ok(())
    }

    /// Delete a problem; its memberships go with it.
    ///
    /// Returns `true` if a row was actually deleted.
    ///
    /// # Errors
    ///
    /// Returns [`MathzError::Database`] on SQLite failures.
    pub fn delete_problem(&self, problem: ProblemId) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM problems WHERE id = ?1", params![problem.0.to_string()])?;
        Ok(deleted > 0)
    }

    /// Number of stored problems.
    ///
    /// # Errors
    ///
    /// Returns [`MathzError::Database`] on SQLite failures.
    pub fn problem_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM problems", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Number of problems with no membership at all. Always zero when every
    /// membership mutation goes through the collection manager.
    ///
    /// # Errors
    ///
    /// Returns [`MathzError::Database`] on SQLite failures.
    pub fn orphaned_problem_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM problems p
             WHERE NOT EXISTS (SELECT 1 FROM problem_collections pc WHERE pc.problem_id = p.id)",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Utility
    // ------------------------------------------------------------------

    /// Return the path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run an integrity check on the database.
    ///
    /// # Errors
    ///
    /// Returns [`MathzError::Database`] if the check query itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Raw connection, for tests that need to inject faults.
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl CollectionStore for SqliteStore {
    fn run_in_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn CollectionTx) -> Result<T>,
    {
        let start = Instant::now();
        let tx = self.conn.transaction()?;
        let result = {
            let mut handle = SqliteTx { conn: &tx };
            f(&mut handle)
        };

        match result {
            Ok(value) => {
                tx.commit()?;
                debug!(elapsed_us = start.elapsed().as_micros(), "Transaction committed");
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                debug!(error = %e, "Transaction rolled back");
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction handle
// ---------------------------------------------------------------------------

/// [`CollectionTx`] over an open rusqlite transaction.
struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl CollectionTx for SqliteTx<'_> {
    fn insert_problem(&mut self, problem: &ProblemRecord) -> Result<()> {
        let classification = to_json(&problem.classification)?;
        let explanation = problem.explanation.as_ref().map(to_json).transpose()?;
        self.conn.execute(
            "INSERT INTO problems
                (id, text, category, difficulty, classification, explanation, was_retried, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                problem.id.0.to_string(),
                problem.text,
                problem.classification.category.slug(),
                problem.classification.difficulty_level,
                classification,
                explanation,
                problem.was_retried,
                problem.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn problem_exists(&self, problem: ProblemId) -> Result<bool> {
        let found = self
            .conn
            .prepare_cached("SELECT 1 FROM problems WHERE id = ?1")?
            .query_row(params![problem.0.to_string()], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn find_collection(&self, id: CollectionId) -> Result<Option<Collection>> {
        let sql = format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = ?1");
        let found = self
            .conn
            .prepare_cached(&sql)?
            .query_row(params![id.0.to_string()], collection_from_row)
            .optional()?;
        Ok(found)
    }

    fn find_collection_by_name(&self, name: &str) -> Result<Option<Collection>> {
        let sql = format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE name_key = ?1");
        let found = self
            .conn
            .prepare_cached(&sql)?
            .query_row(params![name_key(name)], collection_from_row)
            .optional()?;
        Ok(found)
    }

    fn default_collection(&self) -> Result<Option<Collection>> {
        let sql = format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE is_default = 1");
        let found = self
            .conn
            .prepare_cached(&sql)?
            .query_row([], collection_from_row)
            .optional()?;
        Ok(found)
    }

    fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let sql = format!(
            "SELECT {COLLECTION_COLUMNS},
                    (SELECT COUNT(*) FROM problem_collections pc WHERE pc.collection_id = c.id)
             FROM collections c
             ORDER BY is_default DESC, is_system DESC, name_key"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let summaries = stmt
            .query_map([], |row| {
                let count: i64 = row.get(8)?;
                Ok(CollectionSummary {
                    collection: collection_from_row(row)?,
                    problem_count: usize::try_from(count).unwrap_or(0),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summaries)
    }

    fn insert_collection(&mut self, collection: &Collection) -> Result<()> {
        self.conn.execute(
            "INSERT INTO collections
                (id, name, name_key, description, color, icon, is_system, is_default, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                collection.id.0.to_string(),
                collection.name,
                name_key(&collection.name),
                collection.description,
                collection.color,
                collection.icon,
                collection.is_system,
                collection.is_default,
                collection.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn update_collection(&mut self, collection: &Collection) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE collections
             SET name = ?2, name_key = ?3, description = ?4, color = ?5, icon = ?6
             WHERE id = ?1",
            params![
                collection.id.0.to_string(),
                collection.name,
                name_key(&collection.name),
                collection.description,
                collection.color,
                collection.icon,
            ],
        )?;
        if updated == 0 {
            return Err(MathzError::CollectionNotFound(collection.id));
        }
        Ok(())
    }

    fn problems_in(&self, collection: CollectionId) -> Result<Vec<ProblemId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT problem_id FROM problem_collections WHERE collection_id = ?1",
        )?;
        let ids = stmt
            .query_map(params![collection.0.to_string()], |row| uuid_at(row, 0))?
            .map(|r| r.map(ProblemId))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn insert_membership(&mut self, problem: ProblemId, collection: CollectionId) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO problem_collections (problem_id, collection_id, added_at)
             VALUES (?1, ?2, ?3)",
            params![
                problem.0.to_string(),
                collection.0.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }

    fn delete_membership(&mut self, problem: ProblemId, collection: CollectionId) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM problem_collections WHERE problem_id = ?1 AND collection_id = ?2",
            params![problem.0.to_string(), collection.0.to_string()],
        )?;
        Ok(deleted > 0)
    }

    fn count_other_memberships(&self, problem: ProblemId, excluding: CollectionId) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM problem_collections WHERE problem_id = ?1 AND collection_id != ?2",
            params![problem.0.to_string(), excluding.0.to_string()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn delete_collection(&mut self, collection: CollectionId) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM collections WHERE id = ?1",
            params![collection.0.to_string()],
        )?;
        if deleted == 0 {
            return Err(MathzError::CollectionNotFound(collection));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
