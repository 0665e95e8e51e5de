//! Integration tests for the knowledge store.
//!
//! These tests exercise the file-backed store end-to-end, including
//! restarts, corrupt snapshots and concurrent writers.

use std::sync::Arc;

use agentnet_knowledge::{FileBackend, KnowledgeConfig, KnowledgeStore};
use serde_json::json;
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> KnowledgeConfig {
    KnowledgeConfig {
        storage_path: dir.path().join("knowledge").join("memory.json"),
    }
}

#[tokio::test]
async fn test_persistent_entry_survives_restart() {
    let dir = TempDir::new().unwrap();
    let value = json!({"trends": ["rust", "wasm"], "analysis": "growing"});

    {
        let store = KnowledgeStore::new(&test_config(&dir)).await.unwrap();
        store.store("latest_trends", value.clone(), true).await.unwrap();
        store.store("scratch", json!("temporary"), false).await.unwrap();
    }

    let reopened = KnowledgeStore::new(&test_config(&dir)).await.unwrap();
    assert_eq!(reopened.retrieve("latest_trends").await, Some(value));
    assert!(reopened.retrieve("scratch").await.is_none());
    assert!(reopened.entry("latest_trends").await.unwrap().persistent);
}

#[tokio::test]
async fn test_delete_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let store = KnowledgeStore::new(&test_config(&dir)).await.unwrap();
        store.store("a", json!(1), true).await.unwrap();
        store.store("b", json!(2), true).await.unwrap();
        assert!(store.delete("a").await.unwrap());
    }

    let reopened = KnowledgeStore::new(&test_config(&dir)).await.unwrap();
    assert_eq!(reopened.list_keys().await, vec!["b"]);
}

#[tokio::test]
async fn test_clear_temporary_rewrites_snapshot() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let trends = json!({"trends": ["rust"], "analysis": "steady"});

    let store = KnowledgeStore::open(Arc::new(FileBackend::new(config.storage_path.clone())))
        .await
        .unwrap();
    store.store("latest_trends", trends.clone(), true).await.unwrap();
    store.store("team", json!(["architect", "reviewer"]), true).await.unwrap();

    // Lose the snapshot so only clear_temporary can bring it back
    std::fs::remove_file(&config.storage_path).unwrap();

    store.store("scratch", json!("draft"), false).await.unwrap();
    store.store("cursor", json!(42), false).await.unwrap();
    assert!(!config.storage_path.exists());

    assert_eq!(store.clear_temporary().await.unwrap(), 2);
    assert!(config.storage_path.exists());
    drop(store);

    let reopened = KnowledgeStore::new(&config).await.unwrap();
    assert_eq!(reopened.list_keys().await, vec!["latest_trends", "team"]);
    assert_eq!(reopened.retrieve("latest_trends").await, Some(trends));
    assert_eq!(
        reopened.retrieve("team").await,
        Some(json!(["architect", "reviewer"]))
    );
    assert!(reopened.retrieve("scratch").await.is_none());
}

#[tokio::test]
async fn test_missing_file_is_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = KnowledgeStore::new(&test_config(&dir)).await.unwrap();
    assert!(store.is_empty().await);
    assert!(!test_config(&dir).storage_path.exists());
}

#[tokio::test]
async fn test_corrupt_file_starts_empty_and_recovers() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    std::fs::create_dir_all(config.storage_path.parent().unwrap()).unwrap();
    std::fs::write(&config.storage_path, "{\"truncated\": ").unwrap();

    let store = KnowledgeStore::new(&config).await.unwrap();
    assert!(store.is_empty().await);

    store.store("fresh", json!(true), true).await.unwrap();
    let reopened = KnowledgeStore::new(&config).await.unwrap();
    assert_eq!(reopened.retrieve("fresh").await, Some(json!(true)));
}

#[tokio::test]
async fn test_concurrent_writers_all_land() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FileBackend::new(test_config(&dir).storage_path));
    let store = Arc::new(KnowledgeStore::open(backend.clone()).await.unwrap());

    let mut handles = vec![];
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .store(&format!("finding_{i:02}"), json!(i), i % 2 == 0)
                .await
                .unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(store.len().await, 16);

    let reopened = KnowledgeStore::open(backend).await.unwrap();
    assert_eq!(reopened.len().await, 8);
    assert_eq!(reopened.retrieve("finding_04").await, Some(json!(4)));
}
