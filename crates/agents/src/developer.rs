//! Developer agent - feature implementation.
//!
//! Generated code is handed straight to the reviewer, together with the
//! original task context.

use agentnet_common::{Message, Result, Role, DEFAULT_PRIORITY};
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::base::{ignore, render, Agent, AgentContext};

pub const IMPLEMENT_FEATURE: &str = "implement_feature";

const DEVELOPER_SYSTEM_PROMPT: &str = r#"You are a senior software engineer. Your role is to:

1. Implement features from a short description and context
2. Write clean, well-documented code following best practices
3. Include error handling and tests
4. Prefer small, focused changes

Put all code in fenced code blocks.
"#;

pub struct DeveloperAgent {
    ctx: AgentContext,
    system_prompt: Option<String>,
}

impl DeveloperAgent {
    pub fn new(ctx: AgentContext) -> Self {
        Self {
            ctx,
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    async fn implement_feature(&self, message: &Message) -> Result<()> {
        let context = message.context();
        info!(role = %self.role(), from = %message.from(), "Processing implementation task");

        let prompt = format!(
            "Implement feature based on:\nContext: {}\n\n\
             Requirements:\n\
             1. Follow best practices\n\
             2. Include error handling\n\
             3. Add comprehensive tests\n\
             4. Include documentation\n\n\
             Provide production-ready code.",
            render(&context)
        );
        let response = self.ctx.think(self.system_prompt(), &prompt).await?;

        let code = match self.ctx.parser().code(&response) {
            Ok(code) => code,
            Err(e) => {
                warn!(role = %self.role(), error = %e, "No code in response, nothing to review");
                return Ok(());
            }
        };

        self.ctx.send(
            Role::Reviewer,
            json!({ "code": code, "context": context }),
            DEFAULT_PRIORITY,
        )
    }
}

#[async_trait]
impl Agent for DeveloperAgent {
    fn role(&self) -> Role {
        Role::Developer
    }

    fn context(&self) -> &AgentContext {
        &self.ctx
    }

    fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(DEVELOPER_SYSTEM_PROMPT)
    }

    async fn handle(&self, message: Message) -> Result<()> {
        match message.task() {
            Some(IMPLEMENT_FEATURE) => self.implement_feature(&message).await,
            _ => ignore(self.role(), &message),
        }
    }
}
