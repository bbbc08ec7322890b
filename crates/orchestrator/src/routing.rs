//! Static task routing table.
//!
//! A closed set of task-kind tags mapped to agent ids, validated once at
//! startup instead of resolved by ad hoc string matching at dispatch time.
//! Resolution stays best-effort: an unmatched kind yields `None` and the
//! caller decides whether that means drop or error.

use crate::error::OrchestratorError;
use agentmesh_runtime::Agent;
use std::collections::BTreeMap;

/// Does a tag cover a task kind? Exact match, or the tag is a `-`/`:`
/// separated prefix: `optimize` covers `optimize-cache` and
/// `optimize:queries`, but not `optimizer`.
pub(crate) fn tag_matches(tag: &str, kind: &str) -> bool {
    if tag == kind {
        return true;
    }
    kind.strip_prefix(tag)
        .map(|rest| rest.starts_with('-') || rest.starts_with(':'))
        .unwrap_or(false)
}

/// Tag → agent-id routing table. Entries resolve in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TaskRoutes {
    routes: Vec<(String, String)>,
}

impl TaskRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, tag: impl Into<String>, agent: impl Into<String>) -> Self {
        self.routes.push((tag.into(), agent.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Verify every route targets a known agent.
    pub fn validate(&self, agents: &BTreeMap<String, Agent>) -> Result<(), OrchestratorError> {
        for (tag, agent) in &self.routes {
            if !agents.contains_key(agent) {
                return Err(OrchestratorError::UnknownRouteTarget {
                    tag: tag.clone(),
                    agent: agent.clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolve a task kind to an agent id, first matching route wins.
    pub fn resolve(&self, kind: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|(tag, _)| tag_matches(tag, kind))
            .map(|(_, agent)| agent.as_str())
    }
}
