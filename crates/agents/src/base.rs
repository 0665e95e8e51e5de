//! Agent base contract and the receive loop that drives it.

use std::sync::Arc;

use agentnet_common::{Message, NetworkError, Result, Role};
use agentnet_knowledge::KnowledgeStore;
use agentnet_llm::{LlmClient, LlmRequest};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::mailbox::Mailbox;
use crate::parsing::{LineParser, ResponseParser};

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2000;

/// Per-agent reasoning settings.
#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    pub max_output_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: None,
        }
    }
}

/// Everything the network lends to its agents.
///
/// Cloning is cheap. Call [`AgentServices::context`] once per role.
#[derive(Clone)]
pub struct AgentServices {
    pub mailbox: Arc<Mailbox>,
    pub knowledge: Arc<KnowledgeStore>,
    pub llm: Arc<dyn LlmClient>,
    pub parser: Arc<dyn ResponseParser>,
    pub active: watch::Receiver<bool>,
    pub settings: AgentSettings,
}

impl AgentServices {
    /// Services using the default [`LineParser`] and settings.
    pub fn new(
        mailbox: Arc<Mailbox>,
        knowledge: Arc<KnowledgeStore>,
        llm: Arc<dyn LlmClient>,
        active: watch::Receiver<bool>,
    ) -> Self {
        Self {
            mailbox,
            knowledge,
            llm,
            parser: Arc::new(LineParser),
            active,
            settings: AgentSettings::default(),
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Bind the services to one role's identity.
    pub fn context(&self, role: Role) -> AgentContext {
        AgentContext {
            role,
            services: self.clone(),
        }
    }
}

/// An agent's view of the network: its own role plus shared services.
///
/// Messages sent through the context always carry this role as sender.
#[derive(Clone)]
pub struct AgentContext {
    role: Role,
    services: AgentServices,
}

impl AgentContext {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.services.mailbox
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeStore> {
        &self.services.knowledge
    }

    pub fn parser(&self) -> &dyn ResponseParser {
        self.services.parser.as_ref()
    }

    pub fn settings(&self) -> AgentSettings {
        self.services.settings
    }

    /// Whether the network still wants this agent running.
    pub fn is_active(&self) -> bool {
        *self.services.active.borrow()
    }

    /// A receiver that observes the network's activity flag.
    pub fn active_signal(&self) -> watch::Receiver<bool> {
        self.services.active.clone()
    }

    /// One reasoning call with the role's system prompt.
    ///
    /// Failures come back as [`NetworkError::Reasoning`]. There is no retry.
    pub async fn think(&self, system_prompt: &str, prompt: &str) -> Result<String> {
        let settings = self.services.settings;
        debug!(role = %self.role, prompt = %prompt, "Thinking");

        let request = LlmRequest::prompt(prompt, settings.max_output_tokens)
            .with_system_prompt(system_prompt)
            .with_temperature(settings.temperature);

        let response = self.services.llm.complete(request).await.map_err(|e| match e {
            NetworkError::Reasoning(_) => e,
            other => NetworkError::Reasoning(other.to_string()),
        })?;

        debug!(
            role = %self.role,
            model = %response.model,
            response = %response.content,
            "Reasoning response"
        );
        Ok(response.content)
    }

    /// Send `payload` to `to`, signed with this agent's role.
    pub fn send(&self, to: Role, payload: Value, priority: u32) -> Result<()> {
        let message = Message::new(self.role, to, payload).with_priority(priority);
        debug!(from = %self.role, to = %to, id = %message.id(), "Sending message");
        self.services.mailbox.enqueue(message)
    }

    /// Publish to the knowledge store. Persistence failures are logged,
    /// and the in-memory value stays readable.
    pub async fn remember(&self, key: &str, value: Value, persistent: bool) {
        if let Err(e) = self.services.knowledge.store(key, value, persistent).await {
            warn!(role = %self.role, key = %key, error = %e, "Knowledge write not persisted");
        }
    }
}

/// A worker with one role identity.
#[async_trait]
pub trait Agent: Send + Sync {
    fn role(&self) -> Role;

    fn context(&self) -> &AgentContext;

    fn system_prompt(&self) -> &str;

    /// React to one message addressed to this role.
    ///
    /// Messages the role does not recognize are ignored.
    async fn handle(&self, message: Message) -> Result<()>;
}

/// Receive and handle messages until the network goes inactive or the
/// mailbox closes.
///
/// Recoverable errors are logged and the loop moves on. Anything else
/// ends the loop with [`NetworkError::AgentLoop`].
pub async fn run_receive_loop(agent: Arc<dyn Agent>) -> Result<()> {
    let role = agent.role();
    let ctx = agent.context().clone();
    info!(role = %role, "Agent receive loop started");

    while ctx.is_active() {
        let Some(message) = ctx.mailbox().receive(role).await else {
            break;
        };

        let id = message.id().to_string();
        let from = message.from();
        match agent.handle(message).await {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => {
                warn!(role = %role, from = %from, message_id = %id, error = %e, "Message handling failed");
            }
            Err(e) => {
                error!(role = %role, from = %from, message_id = %id, error = %e, "Agent loop failed");
                return Err(match e {
                    NetworkError::AgentLoop { .. } => e,
                    other => NetworkError::agent_loop(role, other.to_string()),
                });
            }
        }
    }

    info!(role = %role, "Agent receive loop stopped");
    Ok(())
}

/// Log and skip a message whose task this role does not handle.
pub(crate) fn ignore(role: Role, message: &Message) -> Result<()> {
    debug!(
        role = %role,
        from = %message.from(),
        task = ?message.task(),
        "Ignoring unrecognized message"
    );
    Ok(())
}

/// Pretty JSON for prompts.
pub fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
