//! Task data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scheduling priority of a queued task.
///
/// Ordering is derived, so `Low < Normal < High < Critical`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Participant list attached to a collaboratively dispatched task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaboration {
    pub participants: Vec<String>,
}

/// A priority-tagged unit of asynchronous work queued for one agent.
///
/// A task is owned exclusively by the queue that holds it and is consumed
/// on dequeue, success or failure. The payload stays opaque at this layer;
/// concrete agents deserialize it into their own typed payload structs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: String,
    pub kind: String,
    pub priority: TaskPriority,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub collaboration: Option<Collaboration>,
}

impl AgentTask {
    /// Create a normal-priority task with a generated id.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            priority: TaskPriority::Normal,
            payload,
            created_at: Utc::now(),
            deadline: None,
            collaboration: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_collaboration(mut self, participants: Vec<String>) -> Self {
        self.collaboration = Some(Collaboration { participants });
        self
    }
}
