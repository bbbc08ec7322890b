//! Agent lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Live lifecycle state of an agent.
///
/// Exactly one value per agent, mutated only by that agent's own lifecycle
/// and scheduling methods. `Error` is reserved for external health
/// reporting; a single task failure returns the agent to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Working,
    Paused,
    Error,
    Stopped,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Working => "working",
            AgentStatus::Paused => "paused",
            AgentStatus::Error => "error",
            AgentStatus::Stopped => "stopped",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde() {
        let encoded = serde_json::to_string(&AgentStatus::Working).unwrap();
        assert_eq!(encoded, format!("\"{}\"", AgentStatus::Working));
    }
}
