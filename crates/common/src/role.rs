//! Role identities for the agents in a network.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::NetworkError;

/// Identity and mailbox address of one specialized agent.
///
/// The set is closed: a network runs exactly one agent per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Coordinator,
    Architect,
    Researcher,
    Developer,
    Reviewer,
    Security,
}

impl Role {
    /// Every role, in a stable order.
    pub const ALL: [Role; 6] = [
        Role::Coordinator,
        Role::Architect,
        Role::Researcher,
        Role::Developer,
        Role::Reviewer,
        Role::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Coordinator => "coordinator",
            Role::Architect => "architect",
            Role::Researcher => "researcher",
            Role::Developer => "developer",
            Role::Reviewer => "reviewer",
            Role::Security => "security",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| NetworkError::Config(format!("Unknown role: {wanted}")))
    }
}
