//! Agent runtime and worker roles for agentnet.
//!
//! This crate provides the pieces every agent is built from, plus the
//! five worker roles:
//!
//! - **Mailbox**: per-role priority queues with exact-recipient delivery
//! - **AgentContext**: role identity plus shared mailbox, knowledge store,
//!   reasoning client and response parser
//! - **Research Agent**: trend analysis and project ideas
//! - **Architect Agent**: system design
//! - **Developer Agent**: feature implementation
//! - **Review Agent**: code review
//! - **Security Agent**: security audits
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      AGENT NETWORK                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐        │
//! │  │Research │  │Architect│  │Developer│  │ Review  │  ...   │
//! │  └────┬────┘  └────┬────┘  └────┬────┘  └────┬────┘        │
//! │       │ receive(role)           │ send(to, payload)        │
//! │       ▼            ▼            ▼            ▼             │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │        Mailbox (one heap + Notify per role)          │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │          Shared Knowledge Store (JSON)               │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod architect;
pub mod base;
pub mod developer;
pub mod mailbox;
pub mod parsing;
pub mod research;
pub mod review;
pub mod security;
pub mod trends;

pub use architect::ArchitectAgent;
pub use base::{run_receive_loop, Agent, AgentContext, AgentServices, AgentSettings};
pub use developer::DeveloperAgent;
pub use mailbox::Mailbox;
pub use parsing::{
    parse_or_degrade, ArchitectureDesign, CodeReview, Decision, LineParser, ParseError, Parsed,
    ProjectSuggestion, ResponseParser, RiskLevel, SecurityAudit, SituationAnalysis,
};
pub use research::{ResearchAgent, LATEST_TRENDS_KEY};
pub use review::ReviewAgent;
pub use security::SecurityAgent;
pub use trends::{JsonFileFeed, StaticTrendFeed, TrendFeed, TrendItem, TrendQuery};
