//! SQLite-backed usage history store.
//!
//! The store is an accessor over a single database file at
//! `{root_dir}/upkeep.db` (or an in-memory database for hosts that do not
//! want persistence). Records are written once by the external producer and
//! only ever read or deleted here.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, params};

use super::schema::{apply_schema, read_schema_version};
use super::types::UsageRecord;
use crate::retention::RetentionWindow;

/// Database filename within the store root directory.
const DB_FILENAME: &str = "upkeep.db";

/// SQLite-backed time-series store of [`UsageRecord`]s.
///
/// Thread-safe via an internal `Mutex<Connection>`. All access is
/// serialized; maintenance traffic is far too light to need more.
pub struct HistoryStore {
    root: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (or create) the database at `{root_dir}/upkeep.db`.
    ///
    /// Applies the schema if the database is new.
    pub fn open(root_dir: &Path) -> Result<Self, HistoryStoreError> {
        std::fs::create_dir_all(root_dir).map_err(|e| HistoryStoreError::Io(e.to_string()))?;
        let db_path = root_dir.join(DB_FILENAME);
        let conn = Connection::open(&db_path)?;
        apply_schema(&conn)?;
        Ok(Self {
            root: Some(root_dir.to_path_buf()),
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database. Used by tests and by hosts that
    /// treat the history as session-scoped.
    pub fn open_in_memory() -> Result<Self, HistoryStoreError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            root: None,
            conn: Mutex::new(conn),
        })
    }

    /// Returns the root directory path, or `None` for in-memory stores.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Read the current schema version from the database.
    pub fn schema_version(&self) -> Result<Option<u32>, HistoryStoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    /// Append one record. Producer-facing; maintenance never writes.
    pub fn insert(&self, record: &UsageRecord) -> Result<(), HistoryStoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO usage_history (timestamp_ms, package, payload) VALUES (?1, ?2, ?3)",
            params![record.timestamp_ms, record.package, record.payload],
        )?;
        Ok(())
    }

    /// All records stamped strictly after `min_timestamp_ms`, ascending by
    /// timestamp.
    pub fn get_all_after(
        &self,
        min_timestamp_ms: u64,
    ) -> Result<Vec<UsageRecord>, HistoryStoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp_ms, package, payload FROM usage_history \
             WHERE timestamp_ms > ?1 ORDER BY timestamp_ms ASC",
        )?;
        let rows = stmt.query_map(params![min_timestamp_ms], row_to_record)?;

        let mut records = Vec::new();
        for r in rows {
            records.push(r?);
        }
        Ok(records)
    }

    /// Delete every record the retention window reports expired at `now_ms`.
    ///
    /// The boundary is inclusive: a record aged exactly the window is
    /// removed. Returns the number of rows deleted.
    pub fn delete_expired(
        &self,
        window: RetentionWindow,
        now_ms: u64,
    ) -> Result<usize, HistoryStoreError> {
        let Some(cutoff) = window.cutoff(now_ms) else {
            return Ok(0);
        };
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM usage_history WHERE timestamp_ms <= ?1",
            params![cutoff],
        )?;
        Ok(rows)
    }

    /// Clear the entire table. Used by the time-changed reset, where prior
    /// recordings are no longer trustworthy. Returns the number of rows
    /// deleted.
    pub fn delete_all(&self) -> Result<usize, HistoryStoreError> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM usage_history", [])?;
        Ok(rows)
    }

    /// Number of records currently stored.
    pub fn count(&self) -> Result<usize, HistoryStoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM usage_history", [], |row| {
            row.get(0)
        })?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Acquire the connection mutex.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, HistoryStoreError> {
        self.conn
            .lock()
            .map_err(|e| HistoryStoreError::Lock(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from the SQLite history backend.
#[derive(Debug, thiserror::Error)]
pub enum HistoryStoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("lock poisoned: {0}")]
    Lock(String),
}

// ---------------------------------------------------------------------------
// Row conversion helper
// ---------------------------------------------------------------------------

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<UsageRecord> {
    Ok(UsageRecord {
        timestamp_ms: row.get(0)?,
        package: row.get(1)?,
        payload: row.get(2)?,
    })
}
