//! Agentmesh core types.
//!
//! Shared data model for the mesh: tasks, messages, agent status, stats
//! counters, lifecycle events, and configuration.

pub mod config;
pub mod events;
pub mod message;
pub mod stats;
pub mod status;
pub mod task;

pub use config::{AgentsConfig, ConfigError, MeshConfig};
pub use events::{AgentEvent, EventBus};
pub use message::{AgentMessage, Recipient};
pub use stats::{AgentStats, StatsSnapshot};
pub use status::AgentStatus;
pub use task::{AgentTask, Collaboration, TaskPriority};

use std::time::Duration;

/// Cadence of every agent's scheduling tick.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bounded capacity of the bus message history ring.
pub const MESSAGE_HISTORY_CAPACITY: usize = 500;

/// Default timeout for request/response correlation on the bus.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Capacity of the lifecycle event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
