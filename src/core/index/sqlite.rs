//! SQLite index backend for persistent storage.

use super::{IndexKey, IndexStats, KeyValueIndex, Namespace};
use crate::error::IndexError;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

const UPSERT: &str = "INSERT INTO entries (namespace, key, value, updated_at)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(namespace, key) DO UPDATE
     SET value = excluded.value, updated_at = excluded.updated_at";

/// SQLite-backed persistent index
///
/// One connection guarded by a mutex. Every call takes the lock for its whole
/// duration, which serializes workers; WAL mode keeps commits cheap.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteIndex {
    /// Open or create an index database at the given path
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| IndexError::OpenFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| IndexError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS entries (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (namespace, key)
            )",
            [],
        )
        .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        debug!("Opened index at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Close the database, surfacing any error from the final flush.
    ///
    /// Dropping the index also closes it, silently.
    pub fn close(self) -> Result<(), IndexError> {
        let path = self.db_path;
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| IndexError::Poisoned { path: path.clone() })?;

        conn.close()
            .map_err(|(_, e)| IndexError::QueryFailed(e.to_string()))?;

        debug!("Closed index at {}", path.display());
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, IndexError> {
        self.conn.lock().map_err(|_| IndexError::Poisoned {
            path: self.db_path.clone(),
        })
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs() as i64
    }

    fn count(conn: &Connection, namespace: Namespace) -> Result<usize, IndexError> {
        conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE namespace = ?",
            [namespace.as_str()],
            |row| row.get::<_, i64>(0).map(|v| v as usize),
        )
        .map_err(|e| IndexError::QueryFailed(e.to_string()))
    }
}

impl KeyValueIndex for SqliteIndex {
    fn get(&self, key: &IndexKey) -> Result<Option<String>, IndexError> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT value FROM entries WHERE namespace = ? AND key = ?",
            params![key.namespace().as_str(), key.key()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| IndexError::QueryFailed(e.to_string()))
    }

    fn put(&self, key: &IndexKey, value: &str) -> Result<(), IndexError> {
        let conn = self.lock()?;

        conn.execute(
            UPSERT,
            params![key.namespace().as_str(), key.key(), value, Self::now()],
        )
        .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &IndexKey,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, IndexError> {
        let mut conn = self.lock()?;

        // IMMEDIATE takes the write lock up front, so another process
        // sharing the file cannot slip in between the read and the write.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        let namespace = key.namespace().as_str();
        let key_str = key.key();

        let current: Option<String> = tx
            .query_row(
                "SELECT value FROM entries WHERE namespace = ? AND key = ?",
                params![namespace, key_str],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        if current.as_deref() != expected {
            return Ok(false);
        }

        tx.execute(UPSERT, params![namespace, key_str, new, Self::now()])
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        tx.commit()
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        Ok(true)
    }

    fn entries(&self, namespace: Namespace) -> Result<Vec<(String, String)>, IndexError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT key, value FROM entries WHERE namespace = ? ORDER BY key")
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([namespace.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| IndexError::QueryFailed(e.to_string()))
    }

    fn stats(&self) -> Result<IndexStats, IndexError> {
        let conn = self.lock()?;

        Ok(IndexStats {
            content_entries: Self::count(&conn, Namespace::Content)?,
            directory_entries: Self::count(&conn, Namespace::Directory)?,
            geo_entries: Self::count(&conn, Namespace::Geo)?,
        })
    }
}
