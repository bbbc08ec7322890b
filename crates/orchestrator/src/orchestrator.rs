//! Agent lifecycle ownership and task dispatch.

use crate::error::OrchestratorError;
use crate::routing::{tag_matches, TaskRoutes};
use agentmesh_bus::MessageBus;
use agentmesh_core::{
    AgentEvent, AgentMessage, AgentStatus, AgentTask, AgentsConfig, EventBus, StatsSnapshot,
    TaskPriority,
};
use agentmesh_runtime::Agent;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bus identity the orchestrator subscribes and sends under.
pub const ORCHESTRATOR_ID: &str = "orchestrator";

/// Reserved message kind for delegation over the bus.
pub const DELEGATE_KIND: &str = "task:delegate";

/// Reserved message kind for collaborative dispatch over the bus.
pub const COLLABORATE_KIND: &str = "task:collaborate";

/// A request to hand one task to the best-suited agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRequest {
    pub task_kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub preferred_agent: Option<String>,
}

impl DelegationRequest {
    pub fn new(task_kind: impl Into<String>, payload: Value) -> Self {
        Self {
            task_kind: task_kind.into(),
            payload,
            priority: TaskPriority::Normal,
            preferred_agent: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn preferring(mut self, agent: impl Into<String>) -> Self {
        self.preferred_agent = Some(agent.into());
        self
    }
}

/// A request to enqueue one task on several agents at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationRequest {
    pub task_kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub priority: TaskPriority,
    pub required_agents: Vec<String>,
}

/// Aggregate diagnostic view of one agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOverview {
    pub id: String,
    pub status: AgentStatus,
    pub stats: StatsSnapshot,
}

struct OrchestratorInner {
    bus: MessageBus,
    events: EventBus,
    config: AgentsConfig,
    routes: TaskRoutes,
    agents: RwLock<BTreeMap<String, Agent>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

/// Owns every agent's lifecycle and mediates cross-agent dispatch.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

impl Orchestrator {
    pub fn new(bus: MessageBus, events: EventBus, routes: TaskRoutes, config: AgentsConfig) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                bus,
                events,
                config,
                routes,
                agents: RwLock::new(BTreeMap::new()),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    /// Register the given agents with the bus, start each one in turn, and
    /// begin listening for the reserved `task:delegate` and
    /// `task:collaborate` kinds.
    ///
    /// Gated on `agents.enabled`; idempotent once a non-empty agent set is
    /// live.
    pub async fn initialize(&self, agents: Vec<Agent>) -> Result<(), OrchestratorError> {
        if !self.inner.config.enabled {
            info!("Agent subsystem disabled by config; skipping initialization");
            return Ok(());
        }
        if !self.inner.agents.read().is_empty() {
            info!("Orchestrator already initialized");
            return Ok(());
        }

        let mut map = BTreeMap::new();
        for agent in &agents {
            if map.insert(agent.id().to_string(), agent.clone()).is_some() {
                return Err(OrchestratorError::DuplicateAgent(agent.id().to_string()));
            }
        }
        self.inner.routes.validate(&map)?;

        for agent in &agents {
            self.inner.bus.register_agent(agent.endpoint());
            agent
                .start()
                .await
                .map_err(|source| OrchestratorError::StartFailed {
                    agent: agent.id().to_string(),
                    source,
                })?;
        }
        *self.inner.agents.write() = map;

        let (_, delegate_rx) = self.inner.bus.subscribe(ORCHESTRATOR_ID, DELEGATE_KIND);
        let (_, collaborate_rx) = self.inner.bus.subscribe(ORCHESTRATOR_ID, COLLABORATE_KIND);
        let dispatcher = tokio::spawn(run_dispatcher(self.clone(), delegate_rx, collaborate_rx));
        *self.inner.dispatcher.lock() = Some(dispatcher);

        info!("Orchestrator initialized with {} agents", agents.len());
        Ok(())
    }

    /// Stop every agent and the reserved-kind dispatcher.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.inner.dispatcher.lock().take() {
            handle.abort();
        }
        let agents: Vec<Agent> = self.inner.agents.read().values().cloned().collect();
        for agent in &agents {
            agent.stop().await;
            self.inner.bus.unregister_agent(agent.id());
        }
        self.inner.agents.write().clear();
        info!("Orchestrator shut down");
    }

    pub fn agent(&self, id: &str) -> Option<Agent> {
        self.inner.agents.read().get(id).cloned()
    }

    pub fn agent_count(&self) -> usize {
        self.inner.agents.read().len()
    }

    /// Diagnostic snapshot across all agents, ordered by id.
    pub fn status(&self) -> Vec<AgentOverview> {
        self.inner
            .agents
            .read()
            .values()
            .map(|agent| AgentOverview {
                id: agent.id().to_string(),
                status: agent.status(),
                stats: agent.stats(),
            })
            .collect()
    }

    /// Best-effort delegation: explicit preference, then capability scan,
    /// then the routing table. An unmatched task is logged and dropped;
    /// returns the queued task id when a target was found.
    pub fn delegate_task(&self, request: DelegationRequest) -> Option<String> {
        let agents = self.inner.agents.read();
        let target = self.resolve_target(&agents, &request.task_kind, request.preferred_agent.as_deref());

        match target.and_then(|id| agents.get(&id)) {
            Some(agent) => {
                let task =
                    AgentTask::new(request.task_kind, request.payload).with_priority(request.priority);
                let task_id = agent.add_task(task);
                debug!("Delegated task {} to agent {}", task_id, agent.id());
                Some(task_id)
            }
            None => {
                warn!(
                    "No agent available for task kind '{}'; dropping",
                    request.task_kind
                );
                None
            }
        }
    }

    /// All-or-nothing collaborative dispatch: when every required agent is
    /// present and not stopped, the same task (carrying the participant
    /// list) lands on each of their queues; otherwise nothing is enqueued.
    ///
    /// There is no completion join — callers watch each participant's own
    /// events if they need convergence.
    pub fn collaborate(&self, request: CollaborationRequest) -> bool {
        let agents = self.inner.agents.read();
        let unavailable: Vec<String> = request
            .required_agents
            .iter()
            .filter(|id| {
                agents
                    .get(*id)
                    .map(|agent| agent.status() == AgentStatus::Stopped)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        if !unavailable.is_empty() {
            warn!(
                "Aborting collaborative dispatch of '{}': unavailable agents {:?}",
                request.task_kind, unavailable
            );
            return false;
        }

        let task = AgentTask::new(request.task_kind, request.payload)
            .with_priority(request.priority)
            .with_collaboration(request.required_agents.clone());
        for id in &request.required_agents {
            if let Some(agent) = agents.get(id) {
                agent.add_task(task.clone());
            }
        }
        debug!(
            "Collaborative task {} enqueued on {} agents",
            task.id,
            request.required_agents.len()
        );
        true
    }

    /// Awaitable dispatch: enqueue on the best agent and resolve once its
    /// completion event is observed.
    ///
    /// # Errors
    /// `NoAgentForTask` when nothing matches (this path never drops
    /// silently), `TaskFailed` when the agent reports a failure, and
    /// `TaskTimeout` after the configured timeout — the in-flight task is
    /// not cancelled, its late event simply finds no listener.
    pub async fn execute_task(
        &self,
        kind: &str,
        payload: Value,
        priority: TaskPriority,
    ) -> Result<Value, OrchestratorError> {
        let agent = {
            let agents = self.inner.agents.read();
            self.resolve_target(&agents, kind, None)
                .and_then(|id| agents.get(&id).cloned())
                .ok_or_else(|| OrchestratorError::NoAgentForTask(kind.to_string()))?
        };

        // Subscribe before enqueueing so the completion cannot be missed.
        let mut events = self.inner.events.subscribe();
        let task = AgentTask::new(kind, payload).with_priority(priority);
        let task_id = task.id.clone();
        agent.add_task(task);

        let timeout = self.inner.config.task_timeout();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Err(_) => {
                    return Err(OrchestratorError::TaskTimeout { task_id, timeout });
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(
                        "Event stream lagged by {} while awaiting task {}",
                        skipped, task_id
                    );
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(OrchestratorError::EventStreamClosed(task_id));
                }
                Ok(Ok(AgentEvent::TaskCompleted {
                    task_id: completed,
                    result,
                    ..
                })) if completed == task_id => return Ok(result),
                Ok(Ok(AgentEvent::TaskFailed {
                    task_id: failed,
                    error,
                    ..
                })) if failed == task_id => {
                    return Err(OrchestratorError::TaskFailed {
                        task_id: failed,
                        error,
                    });
                }
                Ok(Ok(_)) => continue,
            }
        }
    }

    /// Target resolution shared by delegation and awaitable execution.
    fn resolve_target(
        &self,
        agents: &BTreeMap<String, Agent>,
        kind: &str,
        preferred: Option<&str>,
    ) -> Option<String> {
        if let Some(id) = preferred {
            if agents.contains_key(id) {
                return Some(id.to_string());
            }
            warn!("Preferred agent '{}' not registered; falling back", id);
        }

        if let Some(agent) = agents.values().find(|agent| {
            agent
                .capabilities()
                .iter()
                .any(|cap| tag_matches(&cap.name, kind))
        }) {
            return Some(agent.id().to_string());
        }

        self.inner.routes.resolve(kind).map(str::to_string)
    }

    fn handle_delegate_message(&self, message: &AgentMessage) {
        match serde_json::from_value::<DelegationRequest>(message.payload.clone()) {
            Ok(request) => {
                self.delegate_task(request);
            }
            Err(e) => warn!(
                "Malformed delegation request in message {}: {}",
                message.id, e
            ),
        }
    }

    fn handle_collaborate_message(&self, message: &AgentMessage) {
        match serde_json::from_value::<CollaborationRequest>(message.payload.clone()) {
            Ok(request) => {
                self.collaborate(request);
            }
            Err(e) => warn!(
                "Malformed collaboration request in message {}: {}",
                message.id, e
            ),
        }
    }
}

/// Consume the reserved bus kinds until the subscriptions are torn down.
async fn run_dispatcher(
    orchestrator: Orchestrator,
    mut delegate_rx: mpsc::UnboundedReceiver<AgentMessage>,
    mut collaborate_rx: mpsc::UnboundedReceiver<AgentMessage>,
) {
    loop {
        tokio::select! {
            message = delegate_rx.recv() => match message {
                Some(message) => orchestrator.handle_delegate_message(&message),
                None => break,
            },
            message = collaborate_rx.recv() => match message {
                Some(message) => orchestrator.handle_collaborate_message(&message),
                None => break,
            },
        }
    }
    debug!("Orchestrator dispatcher exited");
}
