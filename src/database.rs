use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{Priority, RepeatType, RepeatValue};
use crate::views::ViewKind;

pub mod category_table;
pub mod task_table;
pub mod view_table;

/// How long a writer waits for another connection's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
}

/// Handle to the local table store. Owns a single SQLite connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file at `path` and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL lets readers on other connections proceed while a writer commits
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %db_path.display(), journal_mode = %journal_mode, "opened database");

        let db = Database { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Open a private in-memory database with the full schema
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let db = Database {
            conn: Connection::open_in_memory()?,
        };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        // Canonical tasks
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                note            TEXT,
                due_date        TEXT,
                due_time        TEXT,
                \"group\"       TEXT,
                priority        INTEGER,
                repeat_type     TEXT NOT NULL DEFAULT 'none',
                repeat_value    TEXT,
                archived        INTEGER NOT NULL DEFAULT 0,
                completed       INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS categories (
                name            TEXT PRIMARY KEY,
                color           TEXT,
                archived        INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        // Derived views share one shape. Plain rowid keys (no AUTOINCREMENT) so
        // a cleared table numbers its rows from 1 again.
        for kind in ViewKind::ALL {
            self.conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        id              INTEGER PRIMARY KEY,
                        task_id         INTEGER NOT NULL UNIQUE,
                        title           TEXT NOT NULL,
                        note            TEXT,
                        due_date        TEXT,
                        due_time        TEXT,
                        priority        INTEGER,
                        \"group\"       TEXT,
                        completed       INTEGER NOT NULL DEFAULT 0
                    )",
                    kind.table()
                ),
                [],
            )?;
        }

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_group ON tasks(\"group\")",
            [],
        )?;

        Ok(())
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction spanning every table. Dropping it without
    /// `commit` rolls back.
    ///
    /// The write lock is taken at BEGIN. Every mutation reads before it
    /// writes, and a deferred read-to-write upgrade against another
    /// connection fails with SQLITE_BUSY instead of waiting out the timeout.
    pub fn transaction(&self) -> Result<Transaction<'_>, DatabaseError> {
        Ok(Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?)
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.level())))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        u8::try_from(raw)
            .ok()
            .and_then(|level| Priority::try_from(level).ok())
            .ok_or(FromSqlError::OutOfRange(raw))
    }
}

impl ToSql for RepeatType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RepeatType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

// Repeat values are number-or-text, kept as a JSON scalar
impl ToSql for RepeatValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let json = serde_json::to_string(self)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        Ok(ToSqlOutput::from(json))
    }
}

impl FromSql for RepeatValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        serde_json::from_str(value.as_str()?).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let db = Database::open_in_memory().expect("open db");
        let mut stmt = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .expect("prepare");
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("collect");
        for expected in ["all_tasks", "categories", "overdue_tasks", "tasks", "today_tasks"] {
            assert!(names.iter().any(|n| n == expected), "missing table {expected}");
        }
    }

    #[test]
    fn reopening_a_file_keeps_existing_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("daybook.db");
        let path = path.to_str().expect("utf-8 path");

        let db = Database::new(path).expect("create db");
        let id = task_table::put(db.conn(), &crate::models::Task::new("Persist me"))
            .expect("insert task");
        drop(db);

        let db = Database::new(path).expect("reopen db");
        let task = task_table::get(db.conn(), id).expect("read").expect("row exists");
        assert_eq!(task.title, "Persist me");
    }
}
