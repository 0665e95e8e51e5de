//! Durable storage for knowledge snapshots.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use agentnet_common::{NetworkError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

/// A single named blob holding the latest snapshot.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// The stored snapshot, or `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<String>>;

    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &str) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Snapshot kept in a JSON file on disk.
///
/// Saves go to a sibling `.tmp` file which is then renamed over the
/// snapshot, so readers only ever see a complete file.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotBackend for FileBackend {
    async fn load(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NetworkError::Persistence(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, snapshot: &str) -> Result<()> {
        let persist_err =
            |e: std::io::Error| NetworkError::Persistence(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(persist_err)?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, snapshot).await.map_err(persist_err)?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(persist_err)?;

        debug!(path = %self.path.display(), bytes = snapshot.len(), "Snapshot written");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process snapshot holder.
///
/// Can be switched into a failing mode to exercise persistence errors.
#[derive(Default)]
pub struct MemoryBackend {
    blob: Mutex<Option<String>>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot.
    pub fn with_snapshot(snapshot: impl Into<String>) -> Self {
        let backend = Self::default();
        *backend.blob.lock() = Some(snapshot.into());
        backend
    }

    /// Make every subsequent `save` fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Option<String> {
        self.blob.lock().clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotBackend for MemoryBackend {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self.blob.lock().clone())
    }

    async fn save(&self, snapshot: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NetworkError::Persistence(
                "memory backend is set to fail".into(),
            ));
        }
        *self.blob.lock() = Some(snapshot.to_string());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_backend_missing_file_loads_none() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().join("absent.json"));
        assert!(backend.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_backend_creates_parent_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("memory.json");
        let backend = FileBackend::new(&path);

        backend.save(r#"{"a":1}"#).await.unwrap();

        assert_eq!(backend.load().await.unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert!(!backend.temp_path().exists());
    }

    #[tokio::test]
    async fn memory_backend_can_fail() {
        let backend = MemoryBackend::new();
        backend.save("{}").await.unwrap();
        backend.set_failing(true);

        let err = backend.save("{\"x\":1}").await.unwrap_err();
        assert!(matches!(err, NetworkError::Persistence(_)));
        assert_eq!(backend.snapshot().as_deref(), Some("{}"));
        assert_eq!(backend.save_count(), 1);
    }
}
