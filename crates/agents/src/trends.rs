//! Trend discovery sources for the researcher.

use std::path::PathBuf;

use agentnet_common::{NetworkError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// What the researcher is looking for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendQuery {
    #[serde(default)]
    pub focus_areas: Vec<String>,
    #[serde(default)]
    pub min_stars: u64,
}

impl TrendQuery {
    /// Read `focus_areas` and `min_stars` from a task context.
    ///
    /// Missing or malformed fields fall back to an unfiltered query.
    pub fn from_context(context: &Value) -> Self {
        serde_json::from_value(context.clone()).unwrap_or_default()
    }

    /// Whether `item` clears the star floor and touches a focus area.
    ///
    /// An empty focus list matches everything.
    pub fn matches(&self, item: &TrendItem) -> bool {
        if item.stars < self.min_stars {
            return false;
        }
        if self.focus_areas.is_empty() {
            return true;
        }

        let haystack = format!(
            "{} {} {} {}",
            item.name,
            item.description.as_deref().unwrap_or_default(),
            item.language.as_deref().unwrap_or_default(),
            item.topics.join(" ")
        )
        .to_lowercase();

        self.focus_areas
            .iter()
            .any(|area| haystack.contains(&area.to_lowercase()))
    }
}

/// One trending project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl TrendItem {
    pub fn new(name: impl Into<String>, stars: u64) -> Self {
        Self {
            name: name.into(),
            url: None,
            description: None,
            language: None,
            stars,
            topics: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }
}

/// An asynchronous source of trending projects.
#[async_trait]
pub trait TrendFeed: Send + Sync {
    async fn fetch(&self, query: &TrendQuery) -> Result<Vec<TrendItem>>;
}

/// A fixed list of items, filtered per query.
#[derive(Debug, Clone, Default)]
pub struct StaticTrendFeed {
    items: Vec<TrendItem>,
}

impl StaticTrendFeed {
    pub fn new(items: Vec<TrendItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl TrendFeed for StaticTrendFeed {
    async fn fetch(&self, query: &TrendQuery) -> Result<Vec<TrendItem>> {
        Ok(self
            .items
            .iter()
            .filter(|item| query.matches(item))
            .cloned()
            .collect())
    }
}

/// Reads a JSON array of [`TrendItem`]s from disk on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileFeed {
    path: PathBuf,
}

impl JsonFileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TrendFeed for JsonFileFeed {
    async fn fetch(&self, query: &TrendQuery) -> Result<Vec<TrendItem>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            NetworkError::Feed(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        let items: Vec<TrendItem> = serde_json::from_str(&raw).map_err(|e| {
            NetworkError::Feed(format!("Invalid trend file {}: {e}", self.path.display()))
        })?;

        let matched: Vec<TrendItem> = items.into_iter().filter(|i| query.matches(i)).collect();
        debug!(path = %self.path.display(), matched = matched.len(), "Loaded trends");
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Vec<TrendItem> {
        vec![
            TrendItem::new("llm-router", 900).with_topics(["AI", "inference"]),
            TrendItem::new("tiny-chain", 40).with_description("a web3 toy"),
            TrendItem::new("cargo-speed", 350).with_description("developer-tools for Rust"),
        ]
    }

    #[test]
    fn query_from_context_reads_fields() {
        let query = TrendQuery::from_context(&json!({"focus_areas": ["AI"], "min_stars": 100}));
        assert_eq!(query.focus_areas, vec!["AI"]);
        assert_eq!(query.min_stars, 100);

        assert_eq!(TrendQuery::from_context(&Value::Null), TrendQuery::default());
    }

    #[tokio::test]
    async fn static_feed_filters_by_stars_and_focus() {
        let feed = StaticTrendFeed::new(sample());
        let query = TrendQuery {
            focus_areas: vec!["ai".into(), "web3".into(), "developer-tools".into()],
            min_stars: 100,
        };
        let names: Vec<String> = feed
            .fetch(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["llm-router", "cargo-speed"]);

        let all = feed.fetch(&TrendQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn json_file_feed_reads_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trends.json");
        std::fs::write(&path, serde_json::to_string(&sample()).unwrap()).unwrap();

        let feed = JsonFileFeed::new(&path);
        let items = feed
            .fetch(&TrendQuery {
                min_stars: 300,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn json_file_feed_errors_are_feed_failures() {
        let dir = TempDir::new().unwrap();
        let missing = JsonFileFeed::new(dir.path().join("nope.json"));
        assert!(matches!(
            missing.fetch(&TrendQuery::default()).await,
            Err(NetworkError::Feed(_))
        ));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        assert!(matches!(
            JsonFileFeed::new(&path).fetch(&TrendQuery::default()).await,
            Err(NetworkError::Feed(_))
        ));
    }
}
