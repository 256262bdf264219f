//! Storage layer for eggtrack.
//!
//! The whole entry collection lives in one JSON array at a single resource
//! path inside a [`BlobBackend`]. Every mutation is a read-modify-write of
//! that document. Within one process mutations are serialized through a
//! write gate; writers in other processes sharing the same blob can still
//! overwrite each other's changes.

pub mod backend;
pub mod http;
pub mod migrations;
pub mod schema;
pub mod sqlite;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::allocator;
use crate::config::{BackendKind, Config};
use crate::entry::Entry;
use crate::error::{Error, Result};

pub use backend::{BlobBackend, FsBackend, MemoryBackend};
pub use http::HttpBackend;
pub use sqlite::SqliteBackend;

/// Result of [`EntryStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry was added to the collection.
    Appended,
    /// An entry with the same `id` or `egg_id` already existed; nothing changed.
    Duplicate,
}

/// Durable store for the entry collection.
#[derive(Debug)]
pub struct EntryStore {
    backend: Arc<dyn BlobBackend>,
    path: String,
    write_gate: Mutex<()>,
}

impl EntryStore {
    /// Create a store over `backend` holding its document at `path`.
    #[must_use]
    pub fn new(backend: Arc<dyn BlobBackend>, path: impl Into<String>) -> Self {
        Self {
            backend,
            path: path.into(),
            write_gate: Mutex::new(()),
        }
    }

    /// Create a store backed by process memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryBackend::new()),
            crate::config::DEFAULT_RESOURCE_PATH,
        )
    }

    /// Open the store selected by `config.storage.backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sqlite database cannot be opened.
    pub fn open(config: &Config) -> Result<Self> {
        let backend: Arc<dyn BlobBackend> = match config.storage.backend {
            BackendKind::File => Arc::new(FsBackend::new(config.data_dir())),
            BackendKind::Http => {
                let url = config.storage.http_url.clone().ok_or_else(|| {
                    Error::ConfigValidation {
                        message: "storage.http_url is required for the http backend".to_string(),
                    }
                })?;
                Arc::new(HttpBackend::new(url, config.storage.http_token.clone()))
            }
            BackendKind::Sqlite => Arc::new(SqliteBackend::open(config.database_path())?),
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
        };

        let store = Self::new(backend, config.storage.resource_path.clone());
        info!(
            backend = store.backend.backend_tag(),
            location = %store.location(),
            "entry store opened"
        );
        Ok(store)
    }

    /// Human-readable location of the entry document.
    #[must_use]
    pub fn location(&self) -> String {
        self.backend.describe(&self.path)
    }

    /// Short name of the backend kind.
    #[must_use]
    pub fn backend_tag(&self) -> &'static str {
        self.backend.backend_tag()
    }

    /// Read the whole collection.
    ///
    /// Never fails: a missing document, a transport error or unparseable
    /// content all yield an empty list, logged at `warn` except for the
    /// missing case.
    pub async fn read_all(&self) -> Vec<Entry> {
        match self.try_read_all().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(location = %self.location(), error = %e, "entry read degraded to empty");
                Vec::new()
            }
        }
    }

    /// Read the whole collection, surfacing errors.
    ///
    /// A missing document is an empty collection, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageRead`] if the document exists but cannot be
    /// fetched or is not a JSON array of entries.
    pub async fn try_read_all(&self) -> Result<Vec<Entry>> {
        let Some(bytes) = self.backend.get(&self.path).await? else {
            debug!(location = %self.location(), "entry document missing");
            return Ok(Vec::new());
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::storage_read(self.location(), format!("invalid document: {e}")))
    }

    /// Overwrite the whole collection in one put.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageWrite`] if the backend rejects the write.
    pub async fn write_all(&self, entries: &[Entry]) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        self.write_unlocked(entries).await
    }

    async fn write_unlocked(&self, entries: &[Entry]) -> Result<()> {
        let body = serde_json::to_vec_pretty(entries)?;
        self.backend.put(&self.path, body).await?;
        debug!(count = entries.len(), "entry document written");
        Ok(())
    }

    /// Append one entry unless it collides with an existing one.
    ///
    /// A collision is an equal `id`, or an equal `egg_id` on a non-reset
    /// entry. The first write wins; a duplicate leaves the document untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the current document is unreadable or the write fails.
    #[instrument(skip(self, entry), fields(egg_id = %entry.egg_id))]
    pub async fn append(&self, entry: Entry) -> Result<AppendOutcome> {
        let _gate = self.write_gate.lock().await;
        let mut entries = self.try_read_all().await?;

        if is_duplicate(&entries, &entry) {
            info!(id = %entry.id, "duplicate entry ignored");
            return Ok(AppendOutcome::Duplicate);
        }

        entries.push(entry);
        self.write_unlocked(&entries).await?;
        Ok(AppendOutcome::Appended)
    }

    /// Allocate the next egg id and append the entry built from it, as one
    /// step under the write gate.
    ///
    /// # Errors
    ///
    /// Returns an error if the current document is unreadable or the write fails.
    pub async fn append_with_next_egg_id<F>(&self, build: F) -> Result<(Entry, AppendOutcome)>
    where
        F: FnOnce(String) -> Entry + Send,
    {
        let _gate = self.write_gate.lock().await;
        let mut entries = self.try_read_all().await?;

        let entry = build(allocator::next_egg_id(&entries));
        if is_duplicate(&entries, &entry) {
            info!(egg_id = %entry.egg_id, "duplicate entry ignored");
            return Ok((entry, AppendOutcome::Duplicate));
        }

        entries.push(entry.clone());
        self.write_unlocked(&entries).await?;
        info!(egg_id = %entry.egg_id, id = %entry.id, "entry appended");
        Ok((entry, AppendOutcome::Appended))
    }

    /// Remove every entry whose `id` equals `entry_id`.
    ///
    /// The document is rewritten even when nothing matched. Returns whether
    /// anything was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the current document is unreadable or the write fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, entry_id: &str) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        let entries = self.try_read_all().await?;
        let before = entries.len();

        let kept: Vec<Entry> = entries.into_iter().filter(|e| e.id != entry_id).collect();
        let removed = kept.len() != before;
        self.write_unlocked(&kept).await?;

        if removed {
            info!("entry deleted");
        } else {
            debug!("delete matched nothing");
        }
        Ok(removed)
    }

    /// Look up an entry by `id`.
    pub async fn find(&self, entry_id: &str) -> Option<Entry> {
        self.read_all().await.into_iter().find(|e| e.id == entry_id)
    }

    /// Look up an entry by `id`, treating a miss as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no entry has this id.
    pub async fn get(&self, entry_id: &str) -> Result<Entry> {
        self.find(entry_id)
            .await
            .ok_or_else(|| Error::not_found(entry_id))
    }

    /// The number the next allocation would receive.
    pub async fn current_egg_number(&self) -> u64 {
        let entries = self.read_all().await;
        allocator::parse_egg_number(&allocator::next_egg_id(&entries)).unwrap_or(1)
    }

    /// Make `number` the next allocated egg number.
    ///
    /// Earlier reset markers are dropped and a single new marker is appended.
    ///
    /// # Errors
    ///
    /// Returns a validation error for `0`, or a storage error if the document
    /// is unreadable or the write fails.
    #[instrument(skip(self))]
    pub async fn set_egg_number(&self, number: u64) -> Result<u64> {
        if number == 0 {
            return Err(Error::validation("number must be a positive integer"));
        }

        let _gate = self.write_gate.lock().await;
        let mut entries: Vec<Entry> = self
            .try_read_all()
            .await?
            .into_iter()
            .filter(Entry::is_display)
            .collect();
        entries.push(allocator::reset_marker(number));
        self.write_unlocked(&entries).await?;

        let current = allocator::next_egg_number(&entries).unwrap_or(number);
        info!(requested = number, current, "egg number reset");
        Ok(current)
    }

    /// Create the document as an empty array if it does not exist.
    ///
    /// Returns `true` when the document was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or written.
    pub async fn ensure(&self) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        if self.backend.get(&self.path).await?.is_some() {
            return Ok(false);
        }
        self.write_unlocked(&[]).await?;
        info!(location = %self.location(), "created empty entry document");
        Ok(true)
    }

    /// Summarize the stored collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or parsed.
    pub async fn stats(&self) -> Result<StoreStats> {
        let raw = self.backend.get(&self.path).await?;
        let digest = raw.as_deref().map(|b| blake3::hash(b).to_hex().to_string());
        let document_bytes = raw.as_ref().map_or(0, Vec::len);
        let entries: Vec<Entry> = match raw {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::storage_read(self.location(), format!("invalid document: {e}"))
            })?,
            None => Vec::new(),
        };

        let display: Vec<&Entry> = entries.iter().filter(|e| e.is_display()).collect();
        Ok(StoreStats {
            backend: self.backend.backend_tag(),
            location: self.location(),
            total_entries: entries.len(),
            display_entries: display.len(),
            reset_markers: entries.len() - display.len(),
            oldest_entry: display.iter().map(|e| e.created_at).min(),
            newest_entry: display.iter().map(|e| e.created_at).max(),
            next_egg_id: allocator::next_egg_id(&entries),
            document_bytes,
            digest,
        })
    }
}

fn is_duplicate(entries: &[Entry], candidate: &Entry) -> bool {
    entries.iter().any(|existing| {
        existing.id == candidate.id
            || (existing.is_display()
                && candidate.is_display()
                && existing.egg_id == candidate.egg_id)
    })
}

/// Statistics about the stored collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Backend kind.
    pub backend: &'static str,
    /// Location of the entry document.
    pub location: String,
    /// All entries, reset markers included.
    pub total_entries: usize,
    /// Entries shown to users.
    pub display_entries: usize,
    /// Reset markers present.
    pub reset_markers: usize,
    /// Creation time of the oldest displayed entry.
    pub oldest_entry: Option<DateTime<Utc>>,
    /// Creation time of the newest displayed entry.
    pub newest_entry: Option<DateTime<Utc>>,
    /// Id the next allocation would receive.
    pub next_egg_id: String,
    /// Size of the stored document.
    pub document_bytes: usize,
    /// BLAKE3 digest of the stored document, if it exists.
    pub digest: Option<String>,
}
