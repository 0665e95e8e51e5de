//! Coordinator and network supervisor for agentnet.
//!
//! The coordinator is the planning loop of the network:
//! 1. Snapshots its advisory state and the latest trend research
//! 2. Asks the reasoning service for a situation analysis, then decisions
//! 3. Sends one task per decision to the named role
//! 4. Folds the agents' replies back into its advisory state
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────────────────┐
//!            │         Network          │  JoinSet: N receive loops
//!            │  (watch: active, grace)  │          + 1 control loop
//!            └────────────┬─────────────┘
//!                         │
//!              ┌──────────┴──────────┐
//!              ▼                     ▼
//!      ┌──────────────┐      ┌──────────────┐
//!      │ Coordinator  │◄────►│   Mailbox    │◄──── worker agents
//!      │ control loop │      └──────────────┘
//!      └──────┬───────┘      ┌──────────────┐
//!             └─────────────►│  Knowledge   │◄──── researcher
//!                            └──────────────┘
//! ```

pub mod config;
pub mod coordinator;
pub mod network;

pub use config::{AgentsConfig, CoordinatorConfig, NetworkConfig, ResearchConfig};
pub use coordinator::{
    AdvisoryState, AgentStatus, CoordinatorAgent, CoordinatorState, CycleReport, CycleSnapshot,
};
pub use network::{Announcement, Network, NetworkBuilder, MAX_ANNOUNCEMENTS};
