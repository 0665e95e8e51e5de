//! Configuration for an agent network.
//!
//! Every section has serde defaults, so an empty file is a valid config.
//!
//! ```toml
//! [llm]
//! model = "claude-3-sonnet-20240229"
//! max_concurrent_requests = 2
//!
//! [knowledge]
//! storage_path = "./data/knowledge/memory.json"
//!
//! [coordinator]
//! cycle_interval_secs = 30
//! focus_areas = ["AI", "web3"]
//! min_stars = 100
//!
//! [agents]
//! max_output_tokens = 2000
//! shutdown_grace_secs = 5
//!
//! [research]
//! trends_file = "./data/trends.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use agentnet_agents::AgentSettings;
use agentnet_common::{NetworkError, Result};
use agentnet_knowledge::KnowledgeConfig;
use agentnet_llm::LlmConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Top-level network configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub agents: AgentsConfig,

    #[serde(default)]
    pub research: ResearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Seconds between decision cycles
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Topics passed to the researcher when discovery starts
    #[serde(default = "default_focus_areas")]
    pub focus_areas: Vec<String>,

    /// Star floor for trending projects
    #[serde(default = "default_min_stars")]
    pub min_stars: u64,
}

fn default_cycle_interval() -> u64 {
    30
}

fn default_focus_areas() -> Vec<String> {
    ["AI", "web3", "developer-tools", "machine-learning"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_min_stars() -> u64 {
    100
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval(),
            focus_areas: default_focus_areas(),
            min_stars: default_min_stars(),
        }
    }
}

impl CoordinatorConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Output cap for every reasoning call
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// How long `stop` waits for loops before aborting them
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_max_output_tokens() -> u32 {
    agentnet_agents::base::DEFAULT_MAX_OUTPUT_TOKENS
}

fn default_shutdown_grace() -> u64 {
    5
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: default_max_output_tokens(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// JSON array of trending projects. Without it the researcher sees
    /// an empty feed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trends_file: Option<PathBuf>,
}

impl NetworkConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            NetworkError::Config(format!("Failed to read config '{}': {e}", path.display()))
        })?;
        let config = Self::from_toml(&content)?;

        if config.llm.api_key.is_some() {
            warn!(
                "API key found in config file '{}'. Prefer the ANTHROPIC_API_KEY environment variable.",
                path.display()
            );
        }
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.coordinator.cycle_interval_secs == 0 {
            return Err(NetworkError::Config(
                "coordinator.cycle_interval_secs must be at least 1".into(),
            ));
        }
        if self.agents.max_output_tokens == 0 {
            return Err(NetworkError::Config(
                "agents.max_output_tokens must be at least 1".into(),
            ));
        }
        if self.llm.max_concurrent_requests == 0 {
            return Err(NetworkError::Config(
                "llm.max_concurrent_requests must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            max_output_tokens: self.agents.max_output_tokens,
            temperature: self.llm.temperature,
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.agents.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = NetworkConfig::from_toml("").unwrap();
        assert_eq!(config.coordinator.cycle_interval_secs, 30);
        assert_eq!(
            config.coordinator.focus_areas,
            vec!["AI", "web3", "developer-tools", "machine-learning"]
        );
        assert_eq!(config.coordinator.min_stars, 100);
        assert_eq!(config.agents.max_output_tokens, 2000);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(config.llm.max_concurrent_requests, 2);
        assert!(config.research.trends_file.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = NetworkConfig::from_toml(
            r#"
[llm]
model = "claude-3-haiku-20240307"
temperature = 0.3

[knowledge]
storage_path = "/var/lib/agentnet/kb.json"

[coordinator]
cycle_interval_secs = 5
focus_areas = ["rust"]

[agents]
max_output_tokens = 512

[research]
trends_file = "trends.json"
"#,
        )
        .unwrap();

        assert_eq!(config.llm.model, "claude-3-haiku-20240307");
        assert_eq!(config.knowledge.storage_path, PathBuf::from("/var/lib/agentnet/kb.json"));
        assert_eq!(config.coordinator.cycle_interval(), Duration::from_secs(5));
        assert_eq!(config.coordinator.focus_areas, vec!["rust"]);
        assert_eq!(config.coordinator.min_stars, 100);
        assert_eq!(config.research.trends_file, Some(PathBuf::from("trends.json")));

        let settings = config.agent_settings();
        assert_eq!(settings.max_output_tokens, 512);
        assert_eq!(settings.temperature, Some(0.3));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = NetworkConfig::from_toml("[coordinator]\ncycle_interval_secs = 0").unwrap_err();
        assert!(matches!(err, NetworkError::Config(_)));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(
            NetworkConfig::from_toml("[coordinator\n"),
            Err(NetworkError::Toml(_))
        ));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("agentnet.toml");
        std::fs::write(&path, "[coordinator]\nmin_stars = 7\n").unwrap();

        let config = NetworkConfig::from_file(&path).unwrap();
        assert_eq!(config.coordinator.min_stars, 7);

        assert!(NetworkConfig::from_file(dir.path().join("missing.toml")).is_err());
    }
}
