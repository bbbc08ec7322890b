//! Message routing, subscriptions, history, and request correlation.

use crate::pattern::pattern_matches;
use agentmesh_core::{AgentMessage, Recipient, DEFAULT_REQUEST_TIMEOUT, MESSAGE_HISTORY_CAPACITY};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    #[error("Subscription channel closed: {0}")]
    ChannelClosed(String),
}

/// Something the bus can deliver a message to.
///
/// Agents register an endpoint whose `deliver` pushes into their mailbox;
/// delivery must never block.
pub trait BusEndpoint: Send + Sync {
    fn id(&self) -> &str;
    fn deliver(&self, message: AgentMessage);
}

/// Handle of an active pattern subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    owner: String,
    pattern: String,
    sender: mpsc::UnboundedSender<AgentMessage>,
}

struct BusInner {
    endpoints: RwLock<HashMap<String, Arc<dyn BusEndpoint>>>,
    subscriptions: RwLock<Vec<Subscription>>,
    history: Mutex<VecDeque<AgentMessage>>,
    next_subscription_id: AtomicU64,
}

/// Central message router for one mesh instance.
///
/// Cheap to clone; all clones share the same registry, subscription table,
/// and history ring.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                endpoints: RwLock::new(HashMap::new()),
                subscriptions: RwLock::new(Vec::new()),
                history: Mutex::new(VecDeque::with_capacity(MESSAGE_HISTORY_CAPACITY)),
                next_subscription_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn register_agent(&self, endpoint: Arc<dyn BusEndpoint>) {
        let id = endpoint.id().to_string();
        debug!("Registering agent endpoint: {}", id);
        self.inner.endpoints.write().insert(id, endpoint);
    }

    /// Remove an agent and purge every subscription it owns.
    pub fn unregister_agent(&self, agent_id: &str) {
        self.inner.endpoints.write().remove(agent_id);
        self.inner
            .subscriptions
            .write()
            .retain(|sub| sub.owner != agent_id);
        debug!("Unregistered agent endpoint: {}", agent_id);
    }

    pub fn is_registered(&self, agent_id: &str) -> bool {
        self.inner.endpoints.read().contains_key(agent_id)
    }

    pub fn registered_agents(&self) -> Vec<String> {
        self.inner.endpoints.read().keys().cloned().collect()
    }

    /// Subscribe to message kinds matching a pattern.
    ///
    /// Returns the subscription handle and the receiving end of the fan-out
    /// channel. Dropping the receiver ends the subscription lazily; the bus
    /// prunes it on the next matching route.
    pub fn subscribe(
        &self,
        owner: &str,
        pattern: &str,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<AgentMessage>) {
        let id = SubscriptionId(self.inner.next_subscription_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscriptions.write().push(Subscription {
            id,
            owner: owner.to_string(),
            pattern: pattern.to_string(),
            sender: tx,
        });
        debug!("Subscription {:?} added: owner={}, pattern={}", id, owner, pattern);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.subscriptions.write().retain(|sub| sub.id != id);
    }

    /// Route a message: record it, deliver to the addressee(s), and fan out
    /// to matching subscriptions.
    ///
    /// A message addressed to an unknown agent is logged and dropped, never
    /// queued or retried.
    pub fn route(&self, message: AgentMessage) {
        self.record(&message);

        match &message.to {
            Recipient::Agent(target) => {
                let endpoint = self.inner.endpoints.read().get(target).cloned();
                match endpoint {
                    Some(endpoint) => endpoint.deliver(message.clone()),
                    None => {
                        warn!(
                            "Dropping message {} ({}): unknown recipient {}",
                            message.id, message.kind, target
                        );
                    }
                }
            }
            Recipient::Broadcast => {
                let endpoints: Vec<Arc<dyn BusEndpoint>> =
                    self.inner.endpoints.read().values().cloned().collect();
                for endpoint in endpoints {
                    if endpoint.id() != message.from {
                        endpoint.deliver(message.clone());
                    }
                }
            }
        }

        self.fan_out(&message);
    }

    /// Construct and route a direct message; returns the message id.
    pub fn send(&self, from: &str, to: &str, kind: &str, payload: Value) -> String {
        let message = AgentMessage::new(from, to, kind, payload);
        let id = message.id.clone();
        self.route(message);
        id
    }

    /// Construct and route a broadcast; returns the message id.
    pub fn broadcast(&self, from: &str, kind: &str, payload: Value) -> String {
        let message = AgentMessage::new(from, Recipient::Broadcast, kind, payload);
        let id = message.id.clone();
        self.route(message);
        id
    }

    /// Send a request and await the correlated response.
    ///
    /// The request id is embedded in the payload and the caller is
    /// subscribed to the synthetic kind `<kind>:response:<request_id>` for
    /// the duration of the call. The subscription is torn down on both the
    /// response and the timeout path.
    ///
    /// # Errors
    /// `BusError::RequestTimeout` if no response arrives within `timeout`
    /// (default 5000 ms).
    pub async fn request(
        &self,
        from: &str,
        to: &str,
        kind: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, BusError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let response_kind = format!("{}:response:{}", kind, request_id);
        let (sub_id, mut rx) = self.subscribe(from, &response_kind);

        let message = AgentMessage::new(
            from,
            to,
            kind,
            json!({ "request_id": request_id, "data": payload }),
        )
        .requiring_response();
        self.route(message);

        let timeout = timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let outcome = tokio::time::timeout(timeout, rx.recv()).await;
        self.unsubscribe(sub_id);

        match outcome {
            Ok(Some(response)) => Ok(response.payload),
            Ok(None) => Err(BusError::ChannelClosed(response_kind)),
            Err(_) => Err(BusError::RequestTimeout(timeout)),
        }
    }

    /// Callee-side half of request/response.
    ///
    /// Only emits when the original message asked for a response; nothing
    /// enforces that a callee ever calls this, so requests can always time
    /// out on the caller side.
    pub fn respond(&self, original: &AgentMessage, from: &str, payload: Value) {
        if !original.requires_response {
            debug!(
                "Ignoring respond() for message {}: no response requested",
                original.id
            );
            return;
        }

        let Some(request_id) = original.payload.get("request_id").and_then(Value::as_str) else {
            warn!(
                "Cannot respond to message {}: payload carries no request_id",
                original.id
            );
            return;
        };

        let kind = format!("{}:response:{}", original.kind, request_id);
        self.route(AgentMessage::new(
            from,
            original.from.as_str(),
            kind,
            payload,
        ));
    }

    /// Snapshot of the bounded message history, oldest first.
    pub fn history(&self) -> Vec<AgentMessage> {
        self.inner.history.lock().iter().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.inner.history.lock().len()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.read().len()
    }

    fn record(&self, message: &AgentMessage) {
        let mut history = self.inner.history.lock();
        while history.len() >= MESSAGE_HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(message.clone());
    }

    /// Deliver to every subscription whose pattern matches, pruning the ones
    /// whose receivers have gone away. A dead subscriber never blocks the
    /// others.
    fn fan_out(&self, message: &AgentMessage) {
        let mut stale: Vec<SubscriptionId> = Vec::new();
        {
            let subscriptions = self.inner.subscriptions.read();
            for sub in subscriptions.iter() {
                if !pattern_matches(&sub.pattern, &message.kind) {
                    continue;
                }
                if sub.sender.send(message.clone()).is_err() {
                    debug!(
                        "Pruning subscription {:?} (owner={}): receiver dropped",
                        sub.id, sub.owner
                    );
                    stale.push(sub.id);
                }
            }
        }
        if !stale.is_empty() {
            self.inner
                .subscriptions
                .write()
                .retain(|sub| !stale.contains(&sub.id));
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
