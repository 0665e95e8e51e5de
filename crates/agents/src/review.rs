//! Review agent - code review and quality analysis.

use agentnet_common::{Message, Result, Role, DEFAULT_PRIORITY};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::base::{ignore, render, Agent, AgentContext};
use crate::parsing::parse_or_degrade;

const REVIEW_SYSTEM_PROMPT: &str = r#"You are a senior code reviewer. Your role is to:

1. Review code for correctness, security, and maintainability
2. Identify bugs, vulnerabilities, and code smells
3. Suggest improvements and best practices
4. Provide constructive, actionable feedback

Write one "Issue:" or "Suggestion:" line per finding, then "Approval: yes" or "Approval: no".
"#;

pub struct ReviewAgent {
    ctx: AgentContext,
    system_prompt: Option<String>,
}

impl ReviewAgent {
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

    async fn review_code(&self, code: &str, message: &Message) -> Result<()> {
        info!(role = %self.role(), from = %message.from(), bytes = code.len(), "Processing review task");

        let prompt = format!(
            "Review this code:\n{code}\n\nContext: {}\n\n\
             Check for:\n\
             1. Code quality\n\
             2. Security issues\n\
             3. Performance concerns\n\
             4. Best practices\n\n\
             Provide detailed review with suggestions.",
            render(&message.context())
        );
        let response = self.ctx.think(self.system_prompt(), &prompt).await?;
        let review = parse_or_degrade(
            self.role(),
            "code review",
            self.ctx.parser().code_review(&response),
        );

        self.ctx.send(
            Role::Coordinator,
            json!({ "review": review.value, "status": "completed" }),
            DEFAULT_PRIORITY,
        )
    }
}

#[async_trait]
impl Agent for ReviewAgent {
    fn role(&self) -> Role {
        Role::Reviewer
    }

    fn context(&self) -> &AgentContext {
        &self.ctx
    }

    fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(REVIEW_SYSTEM_PROMPT)
    }

    async fn handle(&self, message: Message) -> Result<()> {
        match message.get("code").and_then(Value::as_str) {
            Some(code) if !code.trim().is_empty() => self.review_code(code, &message).await,
            _ => ignore(self.role(), &message),
        }
    }
}
