//! SQLite edge store
//!
//! Dependency edges live in `.taskgraph/graph.db`. Rows carry an
//! autoincrement sequence so that loading preserves insertion order, which
//! in turn fixes the neighbour order of the rebuilt graph.
//!
//! Each insert runs in an IMMEDIATE transaction and re-checks acyclicity
//! against the committed edge set, so two processes racing opposite edges
//! cannot both succeed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use thiserror::Error;
use tracing::{debug, trace};

use crate::domain::{DependencyEdge, DependencyGraph, EdgeStore, GraphError, IdError, TaskId};

#[derive(Debug, Error)]
pub enum EdgeDbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid task ID in edge store: {0}")]
    InvalidId(#[from] IdError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Edge store schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: i32, supported: i32 },
}

/// Durable dependency edges
pub struct EdgeDb {
    db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl EdgeDb {
    /// Schema version - bump together with a migration in `ensure_schema`
    const SCHEMA_VERSION: i32 = 1;

    /// Opens or creates the edge store for a project
    pub fn open(project_root: &Path) -> Result<Self, EdgeDbError> {
        Self::open_at(project_root.join(".taskgraph").join("graph.db"))
    }

    /// Opens or creates an edge store at an explicit path
    pub fn open_at(db_path: impl Into<PathBuf>) -> Result<Self, EdgeDbError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;

        // WAL lets readers proceed while another process holds the write lock
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let db = Self {
            db_path,
            conn: Mutex::new(conn),
        };
        db.ensure_schema()?;

        debug!(path = %db.db_path.display(), "opened edge store");
        Ok(db)
    }

    /// Returns the database path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_schema(&self) -> Result<(), EdgeDbError> {
        let conn = self.conn();
        let current: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .optional()?
            .unwrap_or(0);

        if current > Self::SCHEMA_VERSION {
            return Err(EdgeDbError::UnsupportedSchema {
                found: current,
                supported: Self::SCHEMA_VERSION,
            });
        }

        if current < 1 {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS dependencies (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    task_id TEXT NOT NULL,
                    depends_on_id TEXT NOT NULL,
                    UNIQUE (task_id, depends_on_id),
                    CHECK (task_id <> depends_on_id)
                );

                CREATE INDEX IF NOT EXISTS idx_dependencies_depends_on
                    ON dependencies(depends_on_id);
                ",
            )?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", Self::SCHEMA_VERSION))?;
            debug!(version = Self::SCHEMA_VERSION, "created edge store schema");
        }

        Ok(())
    }

    fn read_edges(conn: &Connection) -> Result<Vec<DependencyEdge>, EdgeDbError> {
        let mut stmt =
            conn.prepare("SELECT task_id, depends_on_id FROM dependencies ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut edges = Vec::new();
        for row in rows {
            let (task, depends_on) = row?;
            edges.push(DependencyEdge::new(task.parse()?, depends_on.parse()?));
        }
        Ok(edges)
    }

    /// Number of stored edges
    pub fn edge_count(&self) -> Result<usize, EdgeDbError> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM dependencies", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl EdgeStore for EdgeDb {
    type Error = EdgeDbError;

    fn load(&self) -> Result<Vec<DependencyEdge>, EdgeDbError> {
        Self::read_edges(&self.conn())
    }

    fn insert(&self, edge: &DependencyEdge) -> Result<(), EdgeDbError> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Another process may have committed edges since our graph was loaded
        let committed = Self::read_edges(&tx)?;
        let graph = DependencyGraph::from_edges(&committed)?;
        if !graph.validate_dependency(&edge.task, &edge.depends_on)? {
            trace!(task = %edge.task, depends_on = %edge.depends_on, "edge already stored");
            return Ok(());
        }

        tx.execute(
            "INSERT INTO dependencies (task_id, depends_on_id) VALUES (?1, ?2)",
            params![edge.task.as_str(), edge.depends_on.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove(&self, edge: &DependencyEdge) -> Result<bool, EdgeDbError> {
        let removed = self.conn().execute(
            "DELETE FROM dependencies WHERE task_id = ?1 AND depends_on_id = ?2",
            params![edge.task.as_str(), edge.depends_on.as_str()],
        )?;
        Ok(removed > 0)
    }

    fn remove_task(&self, task: &TaskId) -> Result<usize, EdgeDbError> {
        let removed = self.conn().execute(
            "DELETE FROM dependencies WHERE task_id = ?1 OR depends_on_id = ?1",
            params![task.as_str()],
        )?;
        Ok(removed)
    }
}
