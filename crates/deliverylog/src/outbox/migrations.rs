//! Outbox schema versioning.
//!
//! The base schema is version 1. Later versions append a step to
//! [`MIGRATIONS`]; each step runs once, inside the same transaction that
//! records the new version.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// Upgrade steps after the base schema: `(target version, statements)`.
const MIGRATIONS: &[(u32, &[&str])] = &[];

/// Version of the base schema.
const BASE_VERSION: u32 = 1;

/// Metadata key holding the schema version.
const VERSION_KEY: &str = "schema_version";

/// The schema version this build writes.
#[must_use]
pub fn current_version() -> u32 {
    MIGRATIONS.last().map_or(BASE_VERSION, |(version, _)| *version)
}

/// Create the schema if missing and apply pending upgrades.
///
/// # Errors
///
/// Returns [`Error::DatabaseMigration`] if the database was written by a
/// newer build or holds an unreadable version, and a query error if any
/// statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for statement in SCHEMA_STATEMENTS {
        tx.execute(statement, [])?;
    }

    let stored = stored_version(&tx)?;
    let target = current_version();
    if let Some(newer) = stored.filter(|v| *v > target) {
        return Err(Error::DatabaseMigration {
            message: format!(
                "outbox schema version {newer} is newer than this build supports ({target})"
            ),
        });
    }

    let from = stored.unwrap_or(BASE_VERSION);
    for (version, statements) in MIGRATIONS.iter().filter(|(v, _)| *v > from) {
        for statement in *statements {
            tx.execute(statement, [])?;
        }
        info!("Upgraded outbox schema to version {}", version);
    }
    if stored != Some(target) {
        store_version(&tx, target)?;
    }

    tx.commit()?;
    Ok(())
}

/// The recorded schema version, or `None` for a fresh database.
fn stored_version(conn: &Connection) -> Result<Option<u32>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|v| {
            v.parse().map_err(|_| Error::DatabaseMigration {
                message: format!("unreadable outbox schema version {v:?}"),
            })
        })
        .transpose()
}

fn store_version(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}
