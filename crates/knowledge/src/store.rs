//! The shared knowledge store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use agentnet_common::{NetworkError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::backend::{FileBackend, MemoryBackend, SnapshotBackend};
use crate::types::{KnowledgeConfig, KnowledgeEntry};

/// On-disk form of one entry. The key is the enclosing map key.
#[derive(Serialize, Deserialize)]
struct SnapshotRecord {
    value: Value,
    timestamp: DateTime<Utc>,
    persistent: bool,
    #[serde(default)]
    revision: u64,
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<String, KnowledgeEntry>,
    revision: u64,
}

impl StoreState {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn snapshot(&self) -> Result<String> {
        let records: BTreeMap<&str, SnapshotRecord> = self
            .entries
            .values()
            .filter(|entry| entry.persistent)
            .map(|entry| {
                (
                    entry.key.as_str(),
                    SnapshotRecord {
                        value: entry.value.clone(),
                        timestamp: entry.timestamp,
                        persistent: true,
                        revision: entry.revision,
                    },
                )
            })
            .collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }
}

/// Concurrency-safe key/value store shared by every agent.
///
/// All operations serialize on one async mutex. Persistent mutations hold
/// the lock until the snapshot is saved, so snapshots land in the same
/// order as the mutations that produced them.
pub struct KnowledgeStore {
    state: Mutex<StoreState>,
    backend: Arc<dyn SnapshotBackend>,
}

impl KnowledgeStore {
    /// Open a file-backed store at the configured path.
    pub async fn new(config: &KnowledgeConfig) -> Result<Self> {
        Self::open(Arc::new(FileBackend::new(config.storage_path.clone()))).await
    }

    /// A store that never touches disk.
    pub async fn in_memory() -> Result<Self> {
        Self::open(Arc::new(MemoryBackend::new())).await
    }

    /// Open a store over `backend`, loading its snapshot once.
    ///
    /// A missing snapshot yields an empty store. So does a corrupt one,
    /// after logging the parse failure.
    pub async fn open(backend: Arc<dyn SnapshotBackend>) -> Result<Self> {
        let mut state = StoreState::default();

        if let Some(raw) = backend.load().await? {
            match serde_json::from_str::<HashMap<String, SnapshotRecord>>(&raw) {
                Ok(records) => {
                    for (key, record) in records {
                        state.revision = state.revision.max(record.revision);
                        state.entries.insert(
                            key.clone(),
                            KnowledgeEntry {
                                key,
                                value: record.value,
                                timestamp: record.timestamp,
                                persistent: true,
                                revision: record.revision,
                            },
                        );
                    }
                }
                Err(e) => {
                    error!(
                        backend = %backend.describe(),
                        error = %e,
                        "Knowledge snapshot is corrupt, starting empty"
                    );
                }
            }
        }

        info!(
            backend = %backend.describe(),
            entries = state.entries.len(),
            "Knowledge store opened"
        );

        Ok(Self {
            state: Mutex::new(state),
            backend,
        })
    }

    /// Where snapshots go, for logs.
    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    async fn persist(&self, state: &StoreState) -> Result<()> {
        let snapshot = state.snapshot()?;
        self.backend.save(&snapshot).await.map_err(|e| match e {
            NetworkError::Persistence(_) => e,
            other => NetworkError::Persistence(other.to_string()),
        })
    }

    /// Upsert `key` and stamp the current time.
    ///
    /// Persistent writes are saved before this returns. On a save failure
    /// the in-memory entry stays and the error is returned.
    pub async fn store(&self, key: &str, value: Value, persistent: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        let revision = state.next_revision();
        let previous = state.entries.insert(
            key.to_string(),
            KnowledgeEntry {
                key: key.to_string(),
                value,
                timestamp: Utc::now(),
                persistent,
                revision,
            },
        );
        debug!(key = %key, persistent, revision, "Stored knowledge");

        // A temporary write over a persistent key must drop it from disk too.
        if persistent || previous.is_some_and(|p| p.persistent) {
            self.persist(&state).await?;
        }
        Ok(())
    }

    pub async fn retrieve(&self, key: &str) -> Option<Value> {
        let state = self.state.lock().await;
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    pub async fn entry(&self, key: &str) -> Option<KnowledgeEntry> {
        self.state.lock().await.entries.get(key).cloned()
    }

    /// Overwrite an existing key, keeping its persistence flag.
    ///
    /// Returns `false` without writing anything if the key is absent.
    pub async fn update(&self, key: &str, value: Value) -> Result<bool> {
        let mut state = self.state.lock().await;
        let revision = state.next_revision();
        let Some(entry) = state.entries.get_mut(key) else {
            return Ok(false);
        };
        entry.value = value;
        entry.timestamp = Utc::now();
        entry.revision = revision;
        let persistent = entry.persistent;
        debug!(key = %key, persistent, revision, "Updated knowledge");

        if persistent {
            self.persist(&state).await?;
        }
        Ok(true)
    }

    /// Remove `key`. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(removed) = state.entries.remove(key) else {
            return Ok(false);
        };
        debug!(key = %key, "Deleted knowledge");

        if removed.persistent {
            self.persist(&state).await?;
        }
        Ok(true)
    }

    /// All keys, sorted.
    pub async fn list_keys(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut keys: Vec<String> = state.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Entries whose key contains `pattern`, ignoring case.
    pub async fn search(&self, pattern: &str) -> BTreeMap<String, Value> {
        let needle = pattern.to_lowercase();
        let state = self.state.lock().await;
        state
            .entries
            .values()
            .filter(|entry| entry.key.to_lowercase().contains(&needle))
            .map(|entry| (entry.key.clone(), entry.value.clone()))
            .collect()
    }

    /// Drop every temporary entry and return how many were removed.
    pub async fn clear_temporary(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.persistent);
        let removed = before - state.entries.len();
        info!(removed, "Cleared temporary knowledge");

        self.persist(&state).await?;
        Ok(removed)
    }

    /// Up to `limit` entries, newest first.
    pub async fn get_recent(&self, limit: usize) -> Vec<KnowledgeEntry> {
        let state = self.state.lock().await;
        let mut entries: Vec<KnowledgeEntry> = state.entries.values().cloned().collect();
        entries.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.revision.cmp(&a.revision))
        });
        entries.truncate(limit);
        entries
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }
}
