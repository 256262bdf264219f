//! `SQLite` blob backend.
//!
//! Keeps each resource as one row of a key/value table, which makes a single
//! node deployment possible without a separate object store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::backend::BlobBackend;
use super::migrations;
use super::schema::{SELECT_BLOB, UPSERT_BLOB};
use crate::error::{Error, Result};

/// Blob backend storing objects in a `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open or create a database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database for testing.
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
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::internal("sqlite connection lock poisoned"))?;
            f(&guard)
        })
        .await
        .map_err(|e| Error::internal(format!("sqlite task failed: {e}")))?
    }
}

#[async_trait]
impl BlobBackend for SqliteBackend {
    fn backend_tag(&self) -> &'static str {
        "sqlite"
    }

    fn describe(&self, path: &str) -> String {
        format!("sqlite://{}#{path}", self.path.display())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let location = self.describe(path);
        let key = path.to_string();
        self.with_conn(move |conn| {
            let row: Option<(Vec<u8>, Option<String>)> = conn
                .query_row(SELECT_BLOB, [&key], |row| Ok((row.get(0)?, row.get(1)?)))
                .optional()
                .map_err(|e| Error::storage_read(&location, e.to_string()))?;

            match row {
                Some((body, Some(digest))) if digest != blake3::hash(&body).to_hex().as_str() => {
                    Err(Error::storage_read(&location, "stored digest does not match body"))
                }
                Some((body, _)) => Ok(Some(body)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put(&self, path: &str, body: Vec<u8>) -> Result<()> {
        let location = self.describe(path);
        let key = path.to_string();
        self.with_conn(move |conn| {
            let digest = blake3::hash(&body).to_hex().to_string();
            conn.execute(
                UPSERT_BLOB,
                params![key, body, Utc::now().to_rfc3339(), digest],
            )
            .map_err(|e| Error::storage_write(&location, e.to_string()))?;
            debug!(%location, "stored blob");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert_eq!(backend.path().to_string_lossy(), ":memory:");
        assert_eq!(backend.backend_tag(), "sqlite");
    }

    #[tokio::test]
    async fn test_get_missing() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert!(backend.get("labels/entries.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_then_get_and_overwrite() {
        let backend = SqliteBackend::open_in_memory().unwrap();

        backend.put("labels/entries.json", b"[]".to_vec()).await.unwrap();
        assert_eq!(
            backend.get("labels/entries.json").await.unwrap().unwrap(),
            b"[]"
        );

        backend
            .put("labels/entries.json", b"[{}]".to_vec())
            .await
            .unwrap();
        assert_eq!(
            backend.get("labels/entries.json").await.unwrap().unwrap(),
            b"[{}]"
        );
    }

    #[tokio::test]
    async fn test_corrupted_body_is_a_read_error() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.put("entries.json", b"[]".to_vec()).await.unwrap();

        backend
            .with_conn(|conn| {
                conn.execute("UPDATE blobs SET body = x'00' WHERE path = 'entries.json'", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let err = backend.get("entries.json").await.unwrap_err();
        assert!(matches!(err, Error::StorageRead { .. }));
    }

    #[tokio::test]
    async fn test_open_file_based_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested/labels.db");

        let backend = SqliteBackend::open(&db_path).unwrap();
        backend.put("entries.json", b"[]".to_vec()).await.unwrap();
        assert!(db_path.exists());
        drop(backend);

        let reopened = SqliteBackend::open(&db_path).unwrap();
        assert_eq!(reopened.get("entries.json").await.unwrap().unwrap(), b"[]");
    }
}
