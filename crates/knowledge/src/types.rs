//! Knowledge entry types and configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// One published finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Unique key within the store
    pub key: String,

    /// Opaque payload
    pub value: Value,

    /// When the entry was created or last written
    pub timestamp: DateTime<Utc>,

    /// Whether the entry survives restarts
    pub persistent: bool,

    /// Store-wide write counter, breaks timestamp ties
    pub revision: u64,
}

/// Configuration for the knowledge store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Path to the JSON snapshot file
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/knowledge/memory.json")
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_storage_path_is_under_data() {
        let config = KnowledgeConfig::default();
        assert!(config.storage_path.ends_with("memory.json"));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: KnowledgeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.storage_path, default_storage_path());

        let config: KnowledgeConfig =
            serde_json::from_str(r#"{"storage_path": "/tmp/kb.json"}"#).unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/tmp/kb.json"));
    }
}
