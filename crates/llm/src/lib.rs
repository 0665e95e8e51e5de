//! Clients for the external reasoning service.
//!
//! Agents only ever see [`LlmClient`]. Production networks use
//! [`AnthropicClient`] behind a [`SemaphoredClient`]; tests script the
//! responses with [`ScriptedClient`].

pub mod anthropic;
pub mod client;
pub mod config;
pub mod scripted;

pub use anthropic::AnthropicClient;
pub use client::{ChatMessage, ChatRole, LlmClient, LlmRequest, LlmResponse, TokenUsage};
pub use config::{build_llm_client, LlmConfig, SemaphoredClient};
pub use scripted::ScriptedClient;
