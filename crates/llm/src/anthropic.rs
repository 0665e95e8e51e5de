use agentnet_common::{NetworkError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{ChatRole, LlmClient, LlmRequest, LlmResponse, TokenUsage};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2000;

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<MessagesTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct MessagesTurn {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: Option<MessagesUsage>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    model: String,
    api_key: String,
    api_url: String,
    http_client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            api_url: ANTHROPIC_API_URL.to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Point the client at a different endpoint (proxies, gateways).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn build_body(&self, request: &LlmRequest) -> MessagesRequest {
        // System turns travel in the top-level `system` field.
        let messages = request
            .messages
            .iter()
            .filter(|msg| msg.role != ChatRole::System)
            .map(|msg| MessagesTurn {
                role: match msg.role {
                    ChatRole::Assistant => "assistant",
                    _ => "user",
                },
                content: vec![ContentBlock {
                    kind: "text".to_string(),
                    text: msg.content.clone(),
                }],
            })
            .collect();

        MessagesRequest {
            model: self.model.clone(),
            messages,
            system: request.system_prompt.clone(),
            temperature: request.temperature,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let body = self.build_body(&request);
        debug!(model = %self.model, max_tokens = body.max_tokens, "Sending reasoning request");

        let response = self
            .http_client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| NetworkError::Reasoning(format!("Anthropic request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(NetworkError::Reasoning(format!(
                "Anthropic API error {status}: {body_text}"
            )));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            NetworkError::Reasoning(format!("Failed to decode Anthropic response: {e}"))
        })?;

        let content = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(LlmResponse {
            content,
            model: parsed.model,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }),
            finish_reason: parsed.stop_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
