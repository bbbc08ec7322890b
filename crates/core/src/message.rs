//! Message data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Addressee of a message: a concrete agent or every registered agent.
///
/// Serialized as the agent id, with `"*"` meaning broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Recipient {
    Agent(String),
    Broadcast,
}

impl From<String> for Recipient {
    fn from(value: String) -> Self {
        if value == "*" {
            Recipient::Broadcast
        } else {
            Recipient::Agent(value)
        }
    }
}

impl From<&str> for Recipient {
    fn from(value: &str) -> Self {
        Recipient::from(value.to_string())
    }
}

impl From<Recipient> for String {
    fn from(value: Recipient) -> Self {
        match value {
            Recipient::Agent(id) => id,
            Recipient::Broadcast => "*".to_string(),
        }
    }
}

/// A point-to-point or broadcast communication routed through the bus.
///
/// Transient: owned by the bus for the duration of routing and retained only
/// in the bounded history ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub from: String,
    pub to: Recipient,
    pub kind: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    pub requires_response: bool,
}

impl AgentMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<Recipient>,
        kind: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from: from.into(),
            to: to.into(),
            kind: kind.into(),
            payload,
            timestamp: Utc::now(),
            requires_response: false,
        }
    }

    pub fn requiring_response(mut self) -> Self {
        self.requires_response = true;
        self
    }
}
