//! Message types for inter-agent communication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Role;

/// Role-specific message body. Only the receiving agent interprets it.
pub type Payload = serde_json::Map<String, Value>;

/// Lowest urgency a message can carry. Smaller numbers are delivered first.
pub const DEFAULT_PRIORITY: u32 = 1;

/// A role-addressed unit of work exchanged between agents.
///
/// Fields are private so a message cannot change after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    from: Role,
    to: Role,
    payload: Payload,
    priority: u32,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Build a message with the default priority.
    ///
    /// A payload that is not a JSON object is stored under `"data"`.
    pub fn new(from: Role, to: Role, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Payload::new(),
            other => {
                let mut map = Payload::new();
                map.insert("data".into(), other);
                map
            }
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from,
            to,
            payload,
            priority: DEFAULT_PRIORITY,
            created_at: Utc::now(),
        }
    }

    /// Set the delivery priority. Values below 1 are raised to 1.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority.max(DEFAULT_PRIORITY);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn from(&self) -> Role {
        self.from
    }

    pub fn to(&self) -> Role {
        self.to
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// The `task` identifier, when the payload names one.
    pub fn task(&self) -> Option<&str> {
        self.payload.get("task").and_then(Value::as_str)
    }

    /// The `context` blob, or `null` when absent.
    pub fn context(&self) -> Value {
        self.payload.get("context").cloned().unwrap_or(Value::Null)
    }
}
