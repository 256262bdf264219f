//! Blob backends underneath the entry store.
//!
//! A backend moves opaque bytes to and from a logical resource path. It
//! knows nothing about entries; the store above it owns parsing and the
//! read-modify-write cycle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// A whole-object blob store.
#[async_trait]
pub trait BlobBackend: Send + Sync + std::fmt::Debug {
    /// Short tag naming the backend kind (for logs and status output).
    fn backend_tag(&self) -> &'static str;

    /// Human-readable location of `path` in this backend.
    fn describe(&self, path: &str) -> String;

    /// Fetch the object at `path`.
    ///
    /// Returns `Ok(None)` when the object does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageRead`] when the object exists but cannot be
    /// fetched.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Overwrite the object at `path` with `body` in a single operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageWrite`] when the write is not accepted.
    async fn put(&self, path: &str, body: Vec<u8>) -> Result<()>;
}

/// Process-local backend used by tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing the store.
    pub async fn insert_raw(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .await
            .insert(path.to_string(), body.into());
    }
}

#[async_trait]
impl BlobBackend for MemoryBackend {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    fn describe(&self, path: &str) -> String {
        format!("memory://{path}")
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.lock().await.get(path).cloned())
    }

    async fn put(&self, path: &str, body: Vec<u8>) -> Result<()> {
        self.objects.lock().await.insert(path.to_string(), body);
        Ok(())
    }
}

/// Backend storing each object as a file below a root directory.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create a backend rooted at `root`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this backend.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::storage_read(
                self.describe(path),
                "resource path must stay below the data directory",
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobBackend for FsBackend {
    fn backend_tag(&self) -> &'static str {
        "file"
    }

    fn describe(&self, path: &str) -> String {
        self.root.join(path).display().to_string()
    }

    #[instrument(name = "fs_backend_get", skip(self))]
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let file = self.resolve(path)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage_read(self.describe(path), e.to_string())),
        }
    }

    #[instrument(name = "fs_backend_put", skip(self, body), fields(bytes = body.len()))]
    async fn put(&self, path: &str, body: Vec<u8>) -> Result<()> {
        let file = self
            .resolve(path)
            .map_err(|e| Error::storage_write(self.describe(path), e.to_string()))?;

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        // Write a sibling first so readers never observe a partial document.
        let mut tmp_name = file.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".{}.tmp", std::process::id()));
        let tmp = file.with_file_name(tmp_name);

        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| Error::storage_write(self.describe(path), e.to_string()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &file).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::storage_write(self.describe(path), e.to_string()));
        }

        debug!(file = %file.display(), "wrote blob");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_get_missing() {
        let backend = MemoryBackend::new();
        assert!(backend.get("labels/entries.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_put_then_get() {
        let backend = MemoryBackend::new();
        backend.put("a.json", b"[]".to_vec()).await.unwrap();
        assert_eq!(backend.get("a.json").await.unwrap().unwrap(), b"[]");
    }

    #[tokio::test]
    async fn test_memory_insert_raw() {
        let backend = MemoryBackend::new();
        backend.insert_raw("a.json", "garbage").await;
        assert_eq!(backend.get("a.json").await.unwrap().unwrap(), b"garbage");
    }

    #[test]
    fn test_memory_describe() {
        assert_eq!(MemoryBackend::new().describe("x/y.json"), "memory://x/y.json");
        assert_eq!(MemoryBackend::new().backend_tag(), "memory");
    }

    #[tokio::test]
    async fn test_fs_get_missing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        assert!(backend.get("labels/entries.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fs_put_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());

        backend
            .put("labels/entries.json", b"[1]".to_vec())
            .await
            .unwrap();

        let on_disk = std::fs::read(dir.path().join("labels/entries.json")).unwrap();
        assert_eq!(on_disk, b"[1]");
        assert_eq!(
            backend.get("labels/entries.json").await.unwrap().unwrap(),
            b"[1]"
        );
    }

    #[tokio::test]
    async fn test_fs_put_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());

        backend.put("entries.json", b"old".to_vec()).await.unwrap();
        backend.put("entries.json", b"new".to_vec()).await.unwrap();

        assert_eq!(backend.get("entries.json").await.unwrap().unwrap(), b"new");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn test_fs_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());

        assert!(backend.get("../outside.json").await.is_err());
        assert!(backend.put("/etc/passwd", Vec::new()).await.is_err());
    }

    #[test]
    fn test_fs_describe() {
        let backend = FsBackend::new("/data");
        assert_eq!(backend.backend_tag(), "file");
        assert!(backend.describe("labels/entries.json").ends_with("entries.json"));
        assert_eq!(backend.root(), Path::new("/data"));
    }
}
