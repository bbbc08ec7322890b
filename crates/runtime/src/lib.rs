//! Agentmesh agent runtime.
//!
//! The abstract agent: a priority task queue, a lifecycle state machine, a
//! capability table, and a worker task that drains the queue one task at a
//! time on a fixed cadence.

pub mod agent;
pub mod behavior;
pub mod capability;
pub mod queue;

pub use agent::{Agent, AgentContext};
pub use behavior::{AgentBehavior, AgentError};
pub use capability::AgentCapability;
pub use queue::TaskQueue;
