//! Agent harness and worker loop.

use crate::behavior::{AgentBehavior, AgentError};
use crate::capability::AgentCapability;
use crate::queue::TaskQueue;
use agentmesh_bus::{BusEndpoint, BusError, MessageBus};
use agentmesh_core::{
    AgentEvent, AgentMessage, AgentStats, AgentStatus, AgentTask, EventBus, StatsSnapshot,
    POLL_INTERVAL,
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Handle an agent's behavior uses to talk to the rest of the mesh.
///
/// All sends go through here so the owning agent's counters stay accurate.
#[derive(Clone)]
pub struct AgentContext {
    agent_id: String,
    bus: MessageBus,
    events: EventBus,
    stats: Arc<AgentStats>,
}

impl AgentContext {
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Send a direct message; returns the message id.
    pub fn send_message(&self, to: &str, kind: &str, payload: Value) -> String {
        self.stats.inc_messages_sent();
        self.bus.send(&self.agent_id, to, kind, payload)
    }

    /// Broadcast to every other registered agent; returns the message id.
    pub fn broadcast(&self, kind: &str, payload: Value) -> String {
        self.stats.inc_messages_sent();
        self.bus.broadcast(&self.agent_id, kind, payload)
    }

    /// Send a request and await the correlated response.
    pub async fn request(
        &self,
        to: &str,
        kind: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, BusError> {
        self.stats.inc_messages_sent();
        self.bus
            .request(&self.agent_id, to, kind, payload, timeout)
            .await
    }

    /// Answer a request message, if it asked for a response.
    pub fn respond(&self, original: &AgentMessage, payload: Value) {
        self.stats.inc_messages_sent();
        self.bus.respond(original, &self.agent_id, payload)
    }
}

struct AgentInner {
    id: String,
    behavior: Arc<dyn AgentBehavior>,
    status: RwLock<AgentStatus>,
    queue: Mutex<TaskQueue>,
    capabilities: HashMap<String, AgentCapability>,
    stats: Arc<AgentStats>,
    mailbox_tx: RwLock<mpsc::UnboundedSender<AgentMessage>>,
    mailbox_rx: Mutex<Option<mpsc::UnboundedReceiver<AgentMessage>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    ctx: AgentContext,
}

/// An independently scheduled unit of work.
///
/// Cheap to clone; all clones share one queue, status, and stats block. The
/// worker task drains the queue at a fixed 100 ms cadence, one task at a
/// time — per-agent serialization is structural, not lock-based.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        behavior: impl AgentBehavior,
        bus: MessageBus,
        events: EventBus,
    ) -> Self {
        let id = id.into();
        let behavior: Arc<dyn AgentBehavior> = Arc::new(behavior);
        let capabilities: HashMap<String, AgentCapability> = behavior
            .capabilities()
            .into_iter()
            .map(|cap| (cap.name.clone(), cap))
            .collect();
        let stats = Arc::new(AgentStats::new());
        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        let ctx = AgentContext {
            agent_id: id.clone(),
            bus,
            events,
            stats: stats.clone(),
        };

        Self {
            inner: Arc::new(AgentInner {
                id,
                behavior,
                status: RwLock::new(AgentStatus::Stopped),
                queue: Mutex::new(TaskQueue::new()),
                capabilities,
                stats,
                mailbox_tx: RwLock::new(mailbox_tx),
                mailbox_rx: Mutex::new(Some(mailbox_rx)),
                worker: Mutex::new(None),
                ctx,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn status(&self) -> AgentStatus {
        *self.inner.status.read()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn context(&self) -> &AgentContext {
        &self.inner.ctx
    }

    /// Register-ready endpoint handle for the bus.
    pub fn endpoint(&self) -> Arc<dyn BusEndpoint> {
        Arc::new(self.clone())
    }

    /// Start the agent: run the `on_start` hook once, then begin the worker
    /// loop. No-op when already running; only a `Stopped` agent transitions.
    pub async fn start(&self) -> Result<(), AgentError> {
        {
            let mut status = self.inner.status.write();
            match *status {
                AgentStatus::Stopped => *status = AgentStatus::Idle,
                AgentStatus::Idle | AgentStatus::Working => {
                    debug!("Agent {} already running", self.inner.id);
                    return Ok(());
                }
                other => {
                    debug!("Agent {} not startable from {}", self.inner.id, other);
                    return Ok(());
                }
            }
        }

        // Swapping the mailbox closes the previous worker's receiver, so it
        // winds down even though the status is already `Idle` again. Wait it
        // out so two loops never share one queue.
        let mailbox = self.fresh_mailbox();
        let previous = self.inner.worker.lock().take();
        if let Some(handle) = previous {
            let _ = handle.await;
        }

        if let Err(e) = self.inner.behavior.on_start(&self.inner.ctx).await {
            *self.inner.status.write() = AgentStatus::Stopped;
            return Err(e);
        }
        let worker = tokio::spawn(run_worker(self.clone(), mailbox));
        *self.inner.worker.lock() = Some(worker);

        self.inner.ctx.events.emit(AgentEvent::Started {
            agent: self.inner.id.clone(),
        });
        info!("Agent {} started", self.inner.id);
        Ok(())
    }

    /// Stop unconditionally. Pending queued tasks are drained and
    /// discarded; an in-flight task finishes on its own and the worker loop
    /// exits on its next tick.
    pub async fn stop(&self) {
        {
            let mut status = self.inner.status.write();
            if *status == AgentStatus::Stopped {
                return;
            }
            *status = AgentStatus::Stopped;
        }

        let discarded = self.inner.queue.lock().clear();
        if discarded > 0 {
            info!(
                "Agent {}: discarded {} pending tasks on stop",
                self.inner.id, discarded
            );
        }

        self.inner.behavior.on_stop(&self.inner.ctx).await;
        self.inner.ctx.events.emit(AgentEvent::Stopped {
            agent: self.inner.id.clone(),
        });
        info!("Agent {} stopped", self.inner.id);
    }

    /// Suspend dequeueing. The worker keeps ticking heartbeats.
    pub fn pause(&self) {
        let mut status = self.inner.status.write();
        if matches!(*status, AgentStatus::Idle | AgentStatus::Working) {
            *status = AgentStatus::Paused;
            debug!("Agent {} paused", self.inner.id);
        }
    }

    /// Resume dequeueing from `Paused`, or recover from `Error`.
    pub fn resume(&self) {
        let mut status = self.inner.status.write();
        if matches!(*status, AgentStatus::Paused | AgentStatus::Error) {
            *status = AgentStatus::Idle;
            debug!("Agent {} resumed", self.inner.id);
        }
    }

    /// Externally flag the agent unhealthy. Blocks dequeueing until
    /// [`resume`](Agent::resume); the worker keeps ticking.
    pub fn mark_error(&self) {
        let mut status = self.inner.status.write();
        if *status != AgentStatus::Stopped {
            *status = AgentStatus::Error;
            warn!("Agent {} marked unhealthy", self.inner.id);
        }
    }

    /// Enqueue a task; fire-and-forget. Completion is observable only via
    /// emitted events.
    pub fn add_task(&self, task: AgentTask) -> String {
        let task_id = task.id.clone();
        debug!(
            "Agent {}: queued task {} ({}, {:?})",
            self.inner.id, task_id, task.kind, task.priority
        );
        self.inner.queue.lock().push(task);
        task_id
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.inner.capabilities.contains_key(name)
    }

    pub fn capabilities(&self) -> Vec<AgentCapability> {
        self.inner.capabilities.values().cloned().collect()
    }

    /// Invoke a declared capability directly, bypassing the task queue.
    ///
    /// # Errors
    /// `AgentError::CapabilityNotFound` if the agent never declared `name`.
    pub async fn execute_capability(&self, name: &str, data: Value) -> Result<Value, AgentError> {
        if !self.inner.capabilities.contains_key(name) {
            return Err(AgentError::CapabilityNotFound(format!(
                "{} (agent {})",
                name, self.inner.id
            )));
        }
        self.inner.stats.touch();
        self.inner
            .behavior
            .execute_capability(name, data, &self.inner.ctx)
            .await
    }

    /// Send a direct message from this agent.
    pub fn send_message(&self, to: &str, kind: &str, payload: Value) -> String {
        self.inner.ctx.send_message(to, kind, payload)
    }

    fn fresh_mailbox(&self) -> mpsc::UnboundedReceiver<AgentMessage> {
        if let Some(rx) = self.inner.mailbox_rx.lock().take() {
            return rx;
        }
        // Restart: replace the channel so deliveries reach the new worker.
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inner.mailbox_tx.write() = tx;
        rx
    }

    async fn run_task(&self, task: AgentTask) {
        let inner = &self.inner;
        let started = Instant::now();
        debug!(
            "Agent {} processing task {} ({})",
            inner.id, task.id, task.kind
        );
        inner.stats.touch();

        match inner.behavior.process_task(&task, &inner.ctx).await {
            Ok(result) => {
                let duration = started.elapsed();
                inner.stats.record_completion(duration);
                inner.ctx.events.emit(AgentEvent::TaskCompleted {
                    agent: inner.id.clone(),
                    task_id: task.id,
                    result,
                    duration_ms: duration.as_millis() as u64,
                });
            }
            Err(e) => {
                warn!("Agent {} task {} failed: {}", inner.id, task.id, e);
                inner.stats.record_failure();
                inner.ctx.events.emit(AgentEvent::TaskFailed {
                    agent: inner.id.clone(),
                    task_id: task.id,
                    error: e.to_string(),
                });
            }
        }
    }

    async fn dispatch_message(&self, message: AgentMessage) {
        debug!(
            "Agent {} received message {} ({}) from {}",
            self.inner.id, message.id, message.kind, message.from
        );
        if let Err(e) = self
            .inner
            .behavior
            .handle_message(&message, &self.inner.ctx)
            .await
        {
            error!(
                "Agent {} failed handling message {}: {}",
                self.inner.id, message.id, e
            );
        }
    }
}

impl BusEndpoint for Agent {
    fn id(&self) -> &str {
        &self.inner.id
    }

    fn deliver(&self, message: AgentMessage) {
        self.inner.stats.inc_messages_received();
        if self.inner.mailbox_tx.read().send(message).is_err() {
            debug!("Agent {}: mailbox closed, message dropped", self.inner.id);
        }
    }
}

/// The scheduling loop: one tokio task per agent.
///
/// Every tick emits a heartbeat, exits once the agent is `Stopped`, and —
/// only when `Idle` — pops and runs at most one task. Mailbox messages are
/// dispatched as they arrive.
async fn run_worker(agent: Agent, mut mailbox: mpsc::UnboundedReceiver<AgentMessage>) {
    let mut tick = tokio::time::interval(POLL_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            delivered = mailbox.recv() => match delivered {
                Some(message) => agent.dispatch_message(message).await,
                // Mailbox replaced by a restart; the new worker owns it now.
                None => break,
            },
            _ = tick.tick() => {
                if agent.status() == AgentStatus::Stopped {
                    break;
                }
                agent.inner.ctx.events.emit(AgentEvent::Heartbeat {
                    agent: agent.inner.id.clone(),
                    at: Utc::now(),
                });

                let next = if agent.status() == AgentStatus::Idle {
                    agent.inner.queue.lock().pop()
                } else {
                    None
                };
                if let Some(task) = next {
                    *agent.inner.status.write() = AgentStatus::Working;
                    agent.run_task(task).await;
                    // Stay paused/stopped if that happened mid-task.
                    let mut status = agent.inner.status.write();
                    if *status == AgentStatus::Working {
                        *status = AgentStatus::Idle;
                    }
                }
            }
        }
    }
    debug!("Agent {} worker loop exited", agent.inner.id);
}
