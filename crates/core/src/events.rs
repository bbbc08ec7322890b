//! Lifecycle and task outcome events.
//!
//! Agents publish their observable side effects here instead of raising
//! exceptions across agent boundaries. The orchestrator correlates task
//! completions on this stream, and external health monitors watch the
//! heartbeats.

use crate::EVENT_CHANNEL_CAPACITY;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// An observable event emitted by an agent.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    Started {
        agent: String,
    },
    Stopped {
        agent: String,
    },
    Heartbeat {
        agent: String,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        agent: String,
        task_id: String,
        result: Value,
        duration_ms: u64,
    },
    TaskFailed {
        agent: String,
        task_id: String,
        error: String,
    },
}

/// Broadcast fan-out for [`AgentEvent`]s.
///
/// Explicitly constructed and passed by handle; emitting with no live
/// subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn emit(&self, event: AgentEvent) {
        // A send error only means nobody is listening right now.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_emit_without_subscribers_is_ok() {
        let events = EventBus::new();
        events.emit(AgentEvent::Started {
            agent: "optimizer".to_string(),
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        events.emit(AgentEvent::TaskCompleted {
            agent: "optimizer".to_string(),
            task_id: "t1".to_string(),
            result: json!({"ok": true}),
            duration_ms: 12,
        });

        match rx.recv().await.unwrap() {
            AgentEvent::TaskCompleted { task_id, .. } => assert_eq!(task_id, "t1"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event() {
        let events = EventBus::new();
        let mut a = events.subscribe();
        let mut b = events.subscribe();
        events.emit(AgentEvent::Stopped {
            agent: "analyzer".to_string(),
        });

        assert!(matches!(a.recv().await.unwrap(), AgentEvent::Stopped { .. }));
        assert!(matches!(b.recv().await.unwrap(), AgentEvent::Stopped { .. }));
    }
}
