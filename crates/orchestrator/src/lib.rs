//! Agentmesh orchestrator.
//!
//! Owns the set of live agents, starts and stops them together, and layers
//! two dispatch modes on top of the bus and the agents' queues: delegation
//! (one target agent) and collaboration (several target agents).

pub mod error;
pub mod orchestrator;
pub mod routing;

pub use error::OrchestratorError;
pub use orchestrator::{
    AgentOverview, CollaborationRequest, DelegationRequest, Orchestrator, COLLABORATE_KIND,
    DELEGATE_KIND, ORCHESTRATOR_ID,
};
pub use routing::TaskRoutes;
