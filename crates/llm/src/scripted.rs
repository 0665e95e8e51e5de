//! A deterministic reasoning client driven by a queue of canned replies.

use std::collections::VecDeque;

use agentnet_common::{NetworkError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{LlmClient, LlmRequest, LlmResponse};

const SCRIPTED_MODEL: &str = "scripted";

/// Replays queued responses in order and records every prompt it sees.
///
/// Once the script runs out, each call returns the fallback text.
pub struct ScriptedClient {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    fallback: String,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            fallback: String::new(),
        }
    }

    /// Start with a queue of successful responses.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for response in responses {
            client.push_response(response);
        }
        client
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.script.lock().push_back(Ok(response.into()));
    }

    /// Queue a call that fails with [`NetworkError::Reasoning`].
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.script.lock().push_back(Err(reason.into()));
    }

    /// User prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.prompts
            .lock()
            .push(request.last_user_prompt().unwrap_or_default().to_string());

        let next = self.script.lock().pop_front();
        let content = match next {
            Some(Ok(text)) => text,
            Some(Err(reason)) => return Err(NetworkError::Reasoning(reason)),
            None => self.fallback.clone(),
        };

        Ok(LlmResponse {
            content,
            model: SCRIPTED_MODEL.to_string(),
            usage: None,
            finish_reason: Some("end_turn".to_string()),
        })
    }

    fn model_name(&self) -> &str {
        SCRIPTED_MODEL
    }
}
