//! Agentmesh message bus.
//!
//! Central router between registered agents: direct addressing, broadcast,
//! pattern subscriptions, bounded message history, and request/response
//! correlation. Explicitly constructed and passed by handle; never a
//! process-wide static.

pub mod bus;
pub mod pattern;

pub use bus::{BusEndpoint, BusError, MessageBus, SubscriptionId};
pub use pattern::pattern_matches;
