//! Orchestrator errors.

use agentmesh_runtime::AgentError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Duplicate agent id: {0}")]
    DuplicateAgent(String),

    #[error("Route '{tag}' targets unknown agent: {agent}")]
    UnknownRouteTarget { tag: String, agent: String },

    #[error("Agent {agent} failed to start: {source}")]
    StartFailed {
        agent: String,
        #[source]
        source: AgentError,
    },

    #[error("No agent available for task kind: {0}")]
    NoAgentForTask(String),

    #[error("Task {task_id} timed out after {timeout:?}")]
    TaskTimeout { task_id: String, timeout: Duration },

    #[error("Task {task_id} failed: {error}")]
    TaskFailed { task_id: String, error: String },

    #[error("Event stream closed while awaiting task {0}")]
    EventStreamClosed(String),
}
