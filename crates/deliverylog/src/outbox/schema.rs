//! `SQLite` schema definitions for the outbox.
//!
//! This module contains the SQL statements for creating and managing
//! the outbox schema.

/// SQL statement to create the pending rows table.
pub const CREATE_PENDING_ROWS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS pending_rows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queued_at TEXT NOT NULL,
    sink TEXT NOT NULL,
    row_values TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT
)
";

/// SQL statement to create an index on `sink` for per-sink delivery.
pub const CREATE_SINK_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_pending_rows_sink ON pending_rows(sink, id)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_PENDING_ROWS_TABLE,
    CREATE_SINK_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_create_pending_rows_table_contains_required_columns() {
        assert!(CREATE_PENDING_ROWS_TABLE.contains("id INTEGER PRIMARY KEY"));
        assert!(CREATE_PENDING_ROWS_TABLE.contains("queued_at TEXT NOT NULL"));
        assert!(CREATE_PENDING_ROWS_TABLE.contains("row_values TEXT NOT NULL"));
        assert!(CREATE_PENDING_ROWS_TABLE.contains("attempts INTEGER NOT NULL"));
    }
}
