//! Outbox for rows that failed to reach the remote sink.
//!
//! This module provides `SQLite`-based persistent storage for row values
//! waiting to be mirrored, so a temporarily unreachable sink does not lose
//! deliveries that were already recorded locally. Rows are kept per sink and
//! delivered oldest first.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// A row waiting to be appended to a remote sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRow {
    /// Outbox identifier, increasing in queue order.
    pub id: i64,
    /// When the row was queued.
    pub queued_at: DateTime<Utc>,
    /// Name of the sink the row is destined for.
    pub sink: String,
    /// Row values in column order.
    pub values: Vec<String>,
    /// Delivery attempts so far.
    pub attempts: u32,
    /// The most recent failure.
    pub last_error: Option<String>,
}

/// Persistent queue of unsynced rows.
#[derive(Debug)]
pub struct Outbox {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Outbox {
    /// Open or create an outbox database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening outbox at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        debug!("Outbox opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory outbox for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue a row for `sink` after a failed attempt, recording why it could
    /// not be sent.
    ///
    /// Returns the assigned ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn enqueue(&self, sink: &str, values: &[String], reason: &str) -> Result<i64> {
        let id = self.insert(sink, values, 1, Some(reason))?;
        info!("Queued row {} for {} sink: {}", id, sink, reason);
        Ok(id)
    }

    /// Queue a row for `sink` that was never sent because earlier rows are
    /// still waiting. It starts with no attempts and no error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn enqueue_waiting(&self, sink: &str, values: &[String]) -> Result<i64> {
        let id = self.insert(sink, values, 0, None)?;
        info!("Queued row {} for {} sink behind earlier rows", id, sink);
        Ok(id)
    }

    fn insert(
        &self,
        sink: &str,
        values: &[String],
        attempts: u32,
        last_error: Option<&str>,
    ) -> Result<i64> {
        let row_values = serde_json::to_string(values)?;
        self.conn.execute(
            r"
            INSERT INTO pending_rows (queued_at, sink, row_values, attempts, last_error)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![Utc::now().to_rfc3339(), sink, row_values, attempts, last_error],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Rows waiting for `sink`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn pending_for(&self, sink: &str, limit: usize) -> Result<Vec<PendingRow>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, queued_at, sink, row_values, attempts, last_error
            FROM pending_rows WHERE sink = ?1 ORDER BY id ASC LIMIT ?2
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![sink, limit_i64], Self::row_to_pending)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// All waiting rows regardless of sink, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn pending(&self, limit: usize) -> Result<Vec<PendingRow>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, queued_at, sink, row_values, attempts, last_error
            FROM pending_rows ORDER BY id ASC LIMIT ?1
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map([limit_i64], Self::row_to_pending)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Count all waiting rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pending_rows", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count rows waiting for `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_for(&self, sink: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pending_rows WHERE sink = ?1",
            [sink],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Remove a delivered row.
    ///
    /// Returns `true` if a row was removed, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM pending_rows WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Record another failed delivery attempt for a row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn record_failure(&self, id: i64, error: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE pending_rows SET attempts = attempts + 1, last_error = ?2 WHERE id = ?1",
            params![id, error],
        )?;
        Ok(())
    }

    /// Get outbox statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<OutboxStats> {
        let pending_rows = self.count()?;

        let oldest: Option<String> = self
            .conn
            .query_row(
                "SELECT queued_at FROM pending_rows ORDER BY id ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let last_error: Option<String> = self
            .conn
            .query_row(
                "SELECT last_error FROM pending_rows
                 WHERE last_error IS NOT NULL ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let oldest_queued = oldest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(OutboxStats {
            pending_rows,
            oldest_queued,
            last_error,
            db_size_bytes,
        })
    }

    /// Convert a database row to a `PendingRow`.
    fn row_to_pending(row: &rusqlite::Row) -> rusqlite::Result<PendingRow> {
        let id: i64 = row.get(0)?;
        let queued_at_str: String = row.get(1)?;
        let sink: String = row.get(2)?;
        let row_values: String = row.get(3)?;
        let attempts: u32 = row.get(4)?;
        let last_error: Option<String> = row.get(5)?;

        let queued_at = DateTime::parse_from_rfc3339(&queued_at_str)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        let values = serde_json::from_str(&row_values).map_err(|e| {
            warn!("Outbox row {} has unreadable values: {}", id, e);
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(PendingRow {
            id,
            queued_at,
            sink,
            values,
            attempts,
            last_error,
        })
    }
}

/// Statistics about the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboxStats {
    /// Total number of rows waiting.
    pub pending_rows: i64,
    /// When the oldest waiting row was queued.
    pub oldest_queued: Option<DateTime<Utc>>,
    /// The most recently recorded failure.
    pub last_error: Option<String>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
