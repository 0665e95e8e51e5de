//! Security agent - audits.

use agentnet_common::{Message, Result, Role, DEFAULT_PRIORITY};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::base::{ignore, render, Agent, AgentContext};
use crate::parsing::parse_or_degrade;

pub const SECURITY_AUDIT: &str = "security_audit";

const SECURITY_SYSTEM_PROMPT: &str = r#"You are an application security engineer. Your role is to:

1. Find vulnerabilities and insecure defaults
2. Check adherence to security best practices
3. Identify likely threats and compliance gaps

Write one "Vulnerability:" or "Recommendation:" line per finding and finish with "Risk level: low|medium|high|critical".
"#;

pub struct SecurityAgent {
    ctx: AgentContext,
    system_prompt: Option<String>,
}

impl SecurityAgent {
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

    async fn audit(&self, message: &Message) -> Result<()> {
        info!(role = %self.role(), from = %message.from(), "Processing security audit");

        let prompt = format!(
            "Conduct security audit for:\nContext: {}\n\n\
             Check for:\n\
             1. Vulnerabilities\n\
             2. Security best practices\n\
             3. Potential threats\n\
             4. Compliance issues\n\n\
             Provide comprehensive security analysis.",
            render(&message.context())
        );
        let response = self.ctx.think(self.system_prompt(), &prompt).await?;
        let audit = parse_or_degrade(
            self.role(),
            "security audit",
            self.ctx.parser().security_audit(&response),
        );

        self.ctx.send(
            Role::Coordinator,
            json!({ "audit": audit.value, "status": "completed" }),
            DEFAULT_PRIORITY,
        )
    }
}

#[async_trait]
impl Agent for SecurityAgent {
    fn role(&self) -> Role {
        Role::Security
    }

    fn context(&self) -> &AgentContext {
        &self.ctx
    }

    fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(SECURITY_SYSTEM_PROMPT)
    }

    async fn handle(&self, message: Message) -> Result<()> {
        match message.task() {
            Some(SECURITY_AUDIT) => self.audit(&message).await,
            _ => ignore(self.role(), &message),
        }
    }
}
