//! Error types for agentnet.

use crate::Role;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    /// The mailbox could not hand a message to its recipient.
    #[error("Delivery to {role} failed: {reason}")]
    Delivery { role: Role, reason: String },

    /// The external reasoning call failed.
    #[error("Reasoning error: {0}")]
    Reasoning(String),

    /// The knowledge store could not write its snapshot.
    /// The in-memory change is kept.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Trend feed error: {0}")]
    Feed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A receive or control loop failed and the network must stop.
    #[error("Agent loop {role} failed: {reason}")]
    AgentLoop { role: Role, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl NetworkError {
    pub fn delivery(role: Role, reason: impl Into<String>) -> Self {
        Self::Delivery {
            role,
            reason: reason.into(),
        }
    }

    pub fn agent_loop(role: Role, reason: impl Into<String>) -> Self {
        Self::AgentLoop {
            role,
            reason: reason.into(),
        }
    }

    /// Whether the failure is local to one message or one cycle.
    ///
    /// Recoverable errors are logged by the agent loop, which then moves
    /// on to the next message. Anything else brings the network down.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Delivery { .. }
                | Self::Reasoning(_)
                | Self::Persistence(_)
                | Self::Feed(_)
                | Self::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, NetworkError>;
