//! Capability declarations.

use serde::{Deserialize, Serialize};

/// A named, directly invocable handler advertised by an agent.
///
/// Capabilities are the synchronous-RPC path: they bypass the task queue
/// entirely. The declaration lives here; the handler body lives in the
/// agent's behavior implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapability {
    pub name: String,
    pub description: String,
}

impl AgentCapability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}
