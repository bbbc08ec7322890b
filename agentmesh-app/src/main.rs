//! Agentmesh demo binary.
//!
//! Wires a bus, an event channel, two agents, and an orchestrator together,
//! then exercises delegation, collaboration, request/response, and awaitable
//! execution end to end.
//!
//! Run with an optional YAML config path:
//! `agentmesh [mesh.yaml]`

use agentmesh_bus::MessageBus;
use agentmesh_core::{EventBus, MeshConfig, TaskPriority};
use agentmesh_orchestrator::{CollaborationRequest, DelegationRequest, Orchestrator, TaskRoutes};
use agentmesh_runtime::Agent;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

mod agents;

use agents::{AnalyzerBehavior, OptimizerBehavior};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => MeshConfig::load(&path)?,
        None => {
            warn!("No config path given; using defaults");
            MeshConfig::default()
        }
    };

    let bus = MessageBus::new();
    let events = EventBus::new();

    let optimizer = Agent::new("optimizer", OptimizerBehavior, bus.clone(), events.clone());
    let analyzer = Agent::new("analyzer", AnalyzerBehavior, bus.clone(), events.clone());

    let routes = TaskRoutes::new().route("report", "analyzer");
    let orchestrator = Orchestrator::new(bus.clone(), events.clone(), routes, config.agents);
    orchestrator
        .initialize(vec![optimizer, analyzer])
        .await?;

    // Delegation by capability: 'optimize' covers 'optimize-cache'.
    orchestrator.delegate_task(DelegationRequest::new(
        "optimize-cache",
        json!({"target": "cache"}),
    ));

    // Delegation through the routing table.
    orchestrator.delegate_task(
        DelegationRequest::new("report-weekly", json!({"subject": "weekly sales"}))
            .with_priority(TaskPriority::Low),
    );

    // Collaborative dispatch: the same task lands on both agents.
    orchestrator.collaborate(CollaborationRequest {
        task_kind: "audit".to_string(),
        payload: json!({"scope": "full"}),
        priority: TaskPriority::High,
        required_agents: vec!["optimizer".to_string(), "analyzer".to_string()],
    });

    // Request/response over the bus.
    match bus
        .request(
            "main",
            "optimizer",
            "status:query",
            json!({}),
            Some(Duration::from_secs(2)),
        )
        .await
    {
        Ok(response) => info!("Optimizer status: {}", response),
        Err(e) => warn!("Status query failed: {}", e),
    }

    // Awaitable execution: block until the completion event comes back.
    let result = orchestrator
        .execute_task("analyze-metrics", json!({"subject": "startup"}), TaskPriority::Normal)
        .await?;
    info!("Awaited analysis result: {}", result);

    // Let the queued work drain before reading the final stats.
    sleep(Duration::from_millis(600)).await;

    for overview in orchestrator.status() {
        info!(
            "Agent {}: status={}, completed={}, failed={}, sent={}, received={}",
            overview.id,
            overview.status,
            overview.stats.tasks_completed,
            overview.stats.tasks_failed,
            overview.stats.messages_sent,
            overview.stats.messages_received,
        );
    }
    info!("Bus history holds {} messages", bus.history_len());

    orchestrator.shutdown().await;
    Ok(())
}
