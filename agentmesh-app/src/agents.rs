//! Demo agent behaviors.

use agentmesh_core::{AgentMessage, AgentTask};
use agentmesh_runtime::{AgentBehavior, AgentCapability, AgentContext, AgentError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Tunes whatever subsystem its task payload names. Answers `status:query`
/// requests over the bus.
pub struct OptimizerBehavior;

#[async_trait]
impl AgentBehavior for OptimizerBehavior {
    fn capabilities(&self) -> Vec<AgentCapability> {
        vec![AgentCapability::new(
            "optimize",
            "Tune a named subsystem and report the gain",
        )]
    }

    async fn process_task(&self, task: &AgentTask, _ctx: &AgentContext) -> Result<Value, AgentError> {
        let target = task.payload["target"].as_str().unwrap_or("general");
        info!("Optimizing '{}'", target);
        sleep(Duration::from_millis(50)).await;
        Ok(json!({
            "target": target,
            "improvement_pct": 12.5,
        }))
    }

    async fn handle_message(
        &self,
        message: &AgentMessage,
        ctx: &AgentContext,
    ) -> Result<(), AgentError> {
        if message.kind == "status:query" && message.requires_response {
            ctx.respond(message, json!({"healthy": true, "agent": ctx.agent_id()}));
        }
        Ok(())
    }

    async fn execute_capability(
        &self,
        name: &str,
        data: Value,
        _ctx: &AgentContext,
    ) -> Result<Value, AgentError> {
        match name {
            "optimize" => Ok(json!({"optimized": data})),
            other => Err(AgentError::CapabilityNotFound(other.to_string())),
        }
    }
}

/// Produces summaries for analysis and reporting tasks, broadcasting each
/// finding to the rest of the mesh.
pub struct AnalyzerBehavior;

#[async_trait]
impl AgentBehavior for AnalyzerBehavior {
    fn capabilities(&self) -> Vec<AgentCapability> {
        vec![AgentCapability::new(
            "analyze",
            "Summarize a dataset named in the payload",
        )]
    }

    async fn process_task(&self, task: &AgentTask, ctx: &AgentContext) -> Result<Value, AgentError> {
        let subject = task.payload["subject"].as_str().unwrap_or(task.kind.as_str());
        info!("Analyzing '{}'", subject);
        sleep(Duration::from_millis(50)).await;
        let finding = json!({"subject": subject, "anomalies": 0});
        ctx.broadcast("analysis:finding", finding.clone());
        Ok(finding)
    }
}
