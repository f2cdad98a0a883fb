// SQLite persistence for client state (the session token).

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Key under which the bearer token is persisted. It is the only key the
/// session lifecycle writes.
pub const SESSION_TOKEN_KEY: &str = "session_token";

/// Durable key-value storage shared by every client process that opens the
/// same file.
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Open (or create) a SQLite database at `path` and ensure the table
    /// exists. Pass `":memory:"` for an ephemeral in-memory store.
    pub fn open(path: &str) -> Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create directory {}", parent.display())
                    })?;
                }
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open state store at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS client_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("state store mutex poisoned")
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO client_state (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .context("failed to save state")?;
        Ok(())
    }

    /// Read the value under `key`, or `None` if it was never set.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM client_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("failed to load state")
    }

    /// Delete `key`. Removing a missing key is not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM client_state WHERE key = ?1", params![key])
            .context("failed to remove state")?;
        Ok(())
    }

    pub fn token(&self) -> Result<Option<String>> {
        self.get(SESSION_TOKEN_KEY)
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        self.set(SESSION_TOKEN_KEY, token)
    }

    pub fn clear_token(&self) -> Result<()> {
        self.remove(SESSION_TOKEN_KEY)
    }

    /// Number of stored keys.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM client_state", [], |row| row.get(0))
            .context("failed to count state rows")?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
