//! Architect agent - system design.

use agentnet_common::{Message, Result, Role, DEFAULT_PRIORITY};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::base::{ignore, render, Agent, AgentContext};
use crate::parsing::parse_or_degrade;

pub const DESIGN_SYSTEM: &str = "design_system";

const ARCHITECT_SYSTEM_PROMPT: &str = r#"You are a software architect. Your role is to:

1. Turn project goals into a component-level design
2. Define the interfaces between components
3. Describe how data moves through the system
4. Weigh scalability, security and performance trade-offs

Write one "Component:", "Interface:" or "Data flow:" line per item.
"#;

pub struct ArchitectAgent {
    ctx: AgentContext,
    system_prompt: Option<String>,
}

impl ArchitectAgent {
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

    async fn design_system(&self, message: &Message) -> Result<()> {
        info!(role = %self.role(), from = %message.from(), "Processing design task");

        let prompt = format!(
            "Design a system architecture for:\nContext: {}\n\n\
             Consider:\n\
             1. Scalability requirements\n\
             2. Security implications\n\
             3. Integration points\n\
             4. Performance considerations\n\n\
             Provide detailed technical specifications.",
            render(&message.context())
        );
        let response = self.ctx.think(self.system_prompt(), &prompt).await?;
        let design = parse_or_degrade(
            self.role(),
            "architecture design",
            self.ctx.parser().architecture(&response),
        );

        self.ctx.send(
            Role::Coordinator,
            json!({ "architecture": design.value, "status": "completed" }),
            DEFAULT_PRIORITY,
        )
    }
}

#[async_trait]
impl Agent for ArchitectAgent {
    fn role(&self) -> Role {
        Role::Architect
    }

    fn context(&self) -> &AgentContext {
        &self.ctx
    }

    fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(ARCHITECT_SYSTEM_PROMPT)
    }

    async fn handle(&self, message: Message) -> Result<()> {
        match message.task() {
            Some(DESIGN_SYSTEM) => self.design_system(&message).await,
            _ => ignore(self.role(), &message),
        }
    }
}
