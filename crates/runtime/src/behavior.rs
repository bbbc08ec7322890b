//! The behavior seam a concrete agent implements.

use crate::agent::AgentContext;
use crate::capability::AgentCapability;
use agentmesh_core::{AgentMessage, AgentTask};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Agent runtime errors.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),
}

/// What a concrete agent does.
///
/// The harness owns scheduling, stats, and messaging plumbing; an
/// implementation only supplies the domain logic. `process_task` failures
/// are recorded and surfaced as events — they never crash the worker loop.
#[async_trait]
pub trait AgentBehavior: Send + Sync + 'static {
    /// Capabilities advertised by this agent, registered once at
    /// construction.
    fn capabilities(&self) -> Vec<AgentCapability> {
        Vec::new()
    }

    /// One-time startup hook, run before the worker loop begins.
    async fn on_start(&self, _ctx: &AgentContext) -> Result<(), AgentError> {
        Ok(())
    }

    /// Shutdown hook, run when the agent is stopped.
    async fn on_stop(&self, _ctx: &AgentContext) {}

    /// Execute one dequeued task.
    async fn process_task(&self, task: &AgentTask, ctx: &AgentContext) -> Result<Value, AgentError>;

    /// React to a message delivered by the bus. Default: ignore.
    async fn handle_message(
        &self,
        _message: &AgentMessage,
        _ctx: &AgentContext,
    ) -> Result<(), AgentError> {
        Ok(())
    }

    /// Invoke a declared capability directly, bypassing the queue.
    ///
    /// Only called for names the agent declared in [`capabilities`]; the
    /// default rejects everything for behaviors that declare none.
    ///
    /// [`capabilities`]: AgentBehavior::capabilities
    async fn execute_capability(
        &self,
        name: &str,
        _data: Value,
        _ctx: &AgentContext,
    ) -> Result<Value, AgentError> {
        Err(AgentError::CapabilityNotFound(name.to_string()))
    }
}
