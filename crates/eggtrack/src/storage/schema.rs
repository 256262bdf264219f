//! `SQLite` schema definitions for the blob backend.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the blobs table (schema version 1 layout).
pub const CREATE_BLOBS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS blobs (
    path TEXT PRIMARY KEY,
    body BLOB NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Version 2: BLAKE3 digest of each body, checked on read.
pub const ADD_DIGEST_COLUMN: &str = r"
ALTER TABLE blobs ADD COLUMN digest TEXT
";

/// Upsert a blob with its digest.
pub const UPSERT_BLOB: &str = r"
INSERT INTO blobs (path, body, updated_at, digest)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(path) DO UPDATE SET
    body = excluded.body,
    updated_at = excluded.updated_at,
    digest = excluded.digest
";

/// Fetch a blob and its digest by path.
pub const SELECT_BLOB: &str = r"
SELECT body, digest FROM blobs WHERE path = ?1
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_BLOBS_TABLE, CREATE_METADATA_TABLE];
