use std::sync::Arc;

use agentnet_common::{NetworkError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::anthropic::AnthropicClient;
use crate::client::{LlmClient, LlmRequest, LlmResponse};

pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Falls back to `ANTHROPIC_API_KEY` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

fn default_provider() -> String {
    "anthropic".into()
}

fn default_model() -> String {
    "claude-3-sonnet-20240229".into()
}

fn default_max_concurrent() -> usize {
    2
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: None,
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from config, then from the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(ANTHROPIC_API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
    }
}

/// Caps the number of reasoning calls in flight across all agents.
pub struct SemaphoredClient {
    inner: Arc<dyn LlmClient>,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl SemaphoredClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl LlmClient for SemaphoredClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| NetworkError::Reasoning(format!("Semaphore acquire failed: {e}")))?;
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Build the reasoning client described by `config`.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let base: Arc<dyn LlmClient> = match config.provider.as_str() {
        "anthropic" => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                NetworkError::Config(format!(
                    "Anthropic requires an API key (config or {ANTHROPIC_API_KEY_ENV})"
                ))
            })?;
            let mut client = AnthropicClient::new(config.model.clone(), api_key);
            if let Some(url) = &config.api_url {
                client = client.with_api_url(url.clone());
            }
            Arc::new(client)
        }
        other => {
            return Err(NetworkError::Config(format!(
                "Unknown LLM provider: {other}"
            )));
        }
    };

    info!(
        provider = %config.provider,
        model = %config.model,
        max_concurrent = config.max_concurrent_requests,
        "Reasoning client ready"
    );

    Ok(Arc::new(SemaphoredClient::new(
        base,
        config.max_concurrent_requests,
    )))
}
