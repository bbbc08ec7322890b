//! End-to-end orchestration tests: delegation, collaboration, and the
//! awaitable execution path.

use agentmesh_bus::MessageBus;
use agentmesh_core::{AgentStatus, AgentTask, AgentsConfig, EventBus, TaskPriority};
use agentmesh_orchestrator::{
    CollaborationRequest, DelegationRequest, Orchestrator, OrchestratorError, TaskRoutes,
    DELEGATE_KIND,
};
use agentmesh_runtime::{Agent, AgentBehavior, AgentCapability, AgentContext, AgentError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;

struct OptimizerBehavior;

#[async_trait]
impl AgentBehavior for OptimizerBehavior {
    fn capabilities(&self) -> Vec<AgentCapability> {
        vec![AgentCapability::new("optimize", "Tune whatever it is handed")]
    }

    async fn process_task(&self, task: &AgentTask, _ctx: &AgentContext) -> Result<Value, AgentError> {
        Ok(json!({"optimized": task.kind}))
    }
}

struct AnalyzerBehavior;

#[async_trait]
impl AgentBehavior for AnalyzerBehavior {
    async fn process_task(&self, task: &AgentTask, _ctx: &AgentContext) -> Result<Value, AgentError> {
        Ok(json!({"analyzed": task.kind}))
    }
}

struct StallingBehavior;

#[async_trait]
impl AgentBehavior for StallingBehavior {
    fn capabilities(&self) -> Vec<AgentCapability> {
        vec![AgentCapability::new("stall", "Never finishes in time")]
    }

    async fn process_task(&self, _task: &AgentTask, _ctx: &AgentContext) -> Result<Value, AgentError> {
        sleep(Duration::from_secs(30)).await;
        Ok(json!({}))
    }
}

struct FailingBehavior;

#[async_trait]
impl AgentBehavior for FailingBehavior {
    fn capabilities(&self) -> Vec<AgentCapability> {
        vec![AgentCapability::new("doom", "Always fails")]
    }

    async fn process_task(&self, task: &AgentTask, _ctx: &AgentContext) -> Result<Value, AgentError> {
        Err(AgentError::TaskFailed(format!("refused {}", task.kind)))
    }
}

struct Mesh {
    bus: MessageBus,
    events: EventBus,
}

impl Mesh {
    fn new() -> Self {
        Self {
            bus: MessageBus::new(),
            events: EventBus::new(),
        }
    }

    fn agent(&self, id: &str, behavior: impl AgentBehavior) -> Agent {
        Agent::new(id, behavior, self.bus.clone(), self.events.clone())
    }

    fn orchestrator(&self, routes: TaskRoutes, config: AgentsConfig) -> Orchestrator {
        Orchestrator::new(self.bus.clone(), self.events.clone(), routes, config)
    }
}

#[tokio::test]
async fn test_delegation_prefers_capability_match() {
    let mesh = Mesh::new();
    let optimizer = mesh.agent("optimizer", OptimizerBehavior);
    let analyzer = mesh.agent("analyzer", AnalyzerBehavior);
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), AgentsConfig::default());
    orchestrator
        .initialize(vec![optimizer.clone(), analyzer.clone()])
        .await
        .unwrap();
    optimizer.pause();
    analyzer.pause();

    let task_id = orchestrator
        .delegate_task(DelegationRequest::new("optimize-cache", json!({})))
        .unwrap();

    assert!(!task_id.is_empty());
    assert_eq!(optimizer.queue_len(), 1);
    assert_eq!(analyzer.queue_len(), 0);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_delegation_falls_back_to_routing_table() {
    let mesh = Mesh::new();
    let analyzer = mesh.agent("analyzer", AnalyzerBehavior);
    let routes = TaskRoutes::new().route("report", "analyzer");
    let orchestrator = mesh.orchestrator(routes, AgentsConfig::default());
    orchestrator.initialize(vec![analyzer.clone()]).await.unwrap();
    analyzer.pause();

    orchestrator
        .delegate_task(DelegationRequest::new("report-weekly", json!({})))
        .unwrap();
    assert_eq!(analyzer.queue_len(), 1);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_delegation_preferred_agent_overrides_lookup() {
    let mesh = Mesh::new();
    let optimizer = mesh.agent("optimizer", OptimizerBehavior);
    let analyzer = mesh.agent("analyzer", AnalyzerBehavior);
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), AgentsConfig::default());
    orchestrator
        .initialize(vec![optimizer.clone(), analyzer.clone()])
        .await
        .unwrap();
    optimizer.pause();
    analyzer.pause();

    orchestrator
        .delegate_task(DelegationRequest::new("optimize-cache", json!({})).preferring("analyzer"))
        .unwrap();
    assert_eq!(analyzer.queue_len(), 1);
    assert_eq!(optimizer.queue_len(), 0);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_unmatched_delegation_is_dropped() {
    let mesh = Mesh::new();
    let analyzer = mesh.agent("analyzer", AnalyzerBehavior);
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), AgentsConfig::default());
    orchestrator.initialize(vec![analyzer.clone()]).await.unwrap();
    analyzer.pause();

    let result = orchestrator.delegate_task(DelegationRequest::new("transcode-video", json!({})));
    assert!(result.is_none());
    assert_eq!(analyzer.queue_len(), 0);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_delegation_via_bus_message() {
    let mesh = Mesh::new();
    let optimizer = mesh.agent("optimizer", OptimizerBehavior);
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), AgentsConfig::default());
    orchestrator.initialize(vec![optimizer.clone()]).await.unwrap();
    optimizer.pause();

    mesh.bus.send(
        "ui",
        "orchestrator",
        DELEGATE_KIND,
        json!({"task_kind": "optimize-startup", "payload": {"target": "boot"}}),
    );

    sleep(Duration::from_millis(200)).await;
    assert_eq!(optimizer.queue_len(), 1);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_collaboration_is_all_or_nothing() {
    let mesh = Mesh::new();
    let optimizer = mesh.agent("optimizer", OptimizerBehavior);
    let analyzer = mesh.agent("analyzer", AnalyzerBehavior);
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), AgentsConfig::default());
    orchestrator
        .initialize(vec![optimizer.clone(), analyzer.clone()])
        .await
        .unwrap();
    optimizer.pause();
    analyzer.pause();

    // One missing participant aborts the whole dispatch.
    let dispatched = orchestrator.collaborate(CollaborationRequest {
        task_kind: "audit".to_string(),
        payload: json!({}),
        priority: TaskPriority::Normal,
        required_agents: vec![
            "optimizer".to_string(),
            "analyzer".to_string(),
            "ghost".to_string(),
        ],
    });
    assert!(!dispatched);
    assert_eq!(optimizer.queue_len(), 0);
    assert_eq!(analyzer.queue_len(), 0);

    // With everyone present, each participant gets the task.
    let dispatched = orchestrator.collaborate(CollaborationRequest {
        task_kind: "audit".to_string(),
        payload: json!({}),
        priority: TaskPriority::High,
        required_agents: vec!["optimizer".to_string(), "analyzer".to_string()],
    });
    assert!(dispatched);
    assert_eq!(optimizer.queue_len(), 1);
    assert_eq!(analyzer.queue_len(), 1);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_collaboration_rejects_stopped_participant() {
    let mesh = Mesh::new();
    let optimizer = mesh.agent("optimizer", OptimizerBehavior);
    let analyzer = mesh.agent("analyzer", AnalyzerBehavior);
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), AgentsConfig::default());
    orchestrator
        .initialize(vec![optimizer.clone(), analyzer.clone()])
        .await
        .unwrap();
    analyzer.stop().await;
    optimizer.pause();

    let dispatched = orchestrator.collaborate(CollaborationRequest {
        task_kind: "audit".to_string(),
        payload: json!({}),
        priority: TaskPriority::Normal,
        required_agents: vec!["optimizer".to_string(), "analyzer".to_string()],
    });
    assert!(!dispatched);
    assert_eq!(optimizer.queue_len(), 0);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_execute_task_resolves_with_result() {
    let mesh = Mesh::new();
    let optimizer = mesh.agent("optimizer", OptimizerBehavior);
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), AgentsConfig::default());
    orchestrator.initialize(vec![optimizer]).await.unwrap();

    let result = orchestrator
        .execute_task("optimize-cache", json!({"level": 2}), TaskPriority::High)
        .await
        .unwrap();
    assert_eq!(result["optimized"], "optimize-cache");

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_execute_task_times_out() {
    let mesh = Mesh::new();
    let staller = mesh.agent("staller", StallingBehavior);
    let config = AgentsConfig {
        enabled: true,
        task_timeout_ms: 300,
    };
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), config);
    orchestrator.initialize(vec![staller]).await.unwrap();

    let result = orchestrator
        .execute_task("stall-forever", json!({}), TaskPriority::Normal)
        .await;
    assert!(matches!(result, Err(OrchestratorError::TaskTimeout { .. })));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_execute_task_surfaces_failure() {
    let mesh = Mesh::new();
    let doomed = mesh.agent("doomed", FailingBehavior);
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), AgentsConfig::default());
    orchestrator.initialize(vec![doomed]).await.unwrap();

    let result = orchestrator
        .execute_task("doom-scroll", json!({}), TaskPriority::Normal)
        .await;
    match result {
        Err(OrchestratorError::TaskFailed { error, .. }) => {
            assert!(error.contains("doom-scroll"));
        }
        other => panic!("expected TaskFailed, got {:?}", other.map(|_| ())),
    }

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_execute_task_without_target_errors() {
    let mesh = Mesh::new();
    let analyzer = mesh.agent("analyzer", AnalyzerBehavior);
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), AgentsConfig::default());
    orchestrator.initialize(vec![analyzer]).await.unwrap();

    let result = orchestrator
        .execute_task("transcode-video", json!({}), TaskPriority::Normal)
        .await;
    assert!(matches!(result, Err(OrchestratorError::NoAgentForTask(_))));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let mesh = Mesh::new();
    let optimizer = mesh.agent("optimizer", OptimizerBehavior);
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), AgentsConfig::default());
    orchestrator.initialize(vec![optimizer]).await.unwrap();
    assert_eq!(orchestrator.agent_count(), 1);

    let late = mesh.agent("late", AnalyzerBehavior);
    orchestrator.initialize(vec![late.clone()]).await.unwrap();
    assert_eq!(orchestrator.agent_count(), 1);
    assert_eq!(late.status(), AgentStatus::Stopped);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_disabled_config_skips_initialization() {
    let mesh = Mesh::new();
    let optimizer = mesh.agent("optimizer", OptimizerBehavior);
    let config = AgentsConfig {
        enabled: false,
        task_timeout_ms: 5000,
    };
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), config);
    orchestrator.initialize(vec![optimizer.clone()]).await.unwrap();

    assert_eq!(orchestrator.agent_count(), 0);
    assert_eq!(optimizer.status(), AgentStatus::Stopped);
}

#[tokio::test]
async fn test_route_validation_rejects_unknown_agent() {
    let mesh = Mesh::new();
    let analyzer = mesh.agent("analyzer", AnalyzerBehavior);
    let routes = TaskRoutes::new().route("optimize", "nonexistent");
    let orchestrator = mesh.orchestrator(routes, AgentsConfig::default());

    let result = orchestrator.initialize(vec![analyzer]).await;
    assert!(matches!(
        result,
        Err(OrchestratorError::UnknownRouteTarget { .. })
    ));
}

#[tokio::test]
async fn test_status_aggregates_all_agents() {
    let mesh = Mesh::new();
    let optimizer = mesh.agent("optimizer", OptimizerBehavior);
    let analyzer = mesh.agent("analyzer", AnalyzerBehavior);
    let orchestrator = mesh.orchestrator(TaskRoutes::new(), AgentsConfig::default());
    orchestrator
        .initialize(vec![optimizer, analyzer])
        .await
        .unwrap();

    let overview = orchestrator.status();
    assert_eq!(overview.len(), 2);
    // BTreeMap ordering: analyzer before optimizer.
    assert_eq!(overview[0].id, "analyzer");
    assert_eq!(overview[1].id, "optimizer");
    assert_eq!(overview[0].status, AgentStatus::Idle);

    orchestrator.shutdown().await;
}
