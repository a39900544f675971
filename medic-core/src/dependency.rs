//! Dependency edges between agents.

use crate::{AgentName, DependencyType, Timestamp, VersionConstraint};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A directed edge: `dependent` depends on `dependency`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub dependent: AgentName,
    pub dependency: AgentName,
    pub constraint: VersionConstraint,
    pub dependency_type: DependencyType,
    pub created_at: Timestamp,
}

impl DependencyEdge {
    pub fn new(
        dependent: impl Into<AgentName>,
        dependency: impl Into<AgentName>,
        constraint: VersionConstraint,
        dependency_type: DependencyType,
    ) -> Self {
        Self {
            dependent: dependent.into(),
            dependency: dependency.into(),
            constraint,
            dependency_type,
            created_at: Utc::now(),
        }
    }

    /// Shorthand for an unconstrained `requires` edge.
    pub fn requires(dependent: impl Into<AgentName>, dependency: impl Into<AgentName>) -> Self {
        Self::new(
            dependent,
            dependency,
            VersionConstraint::Any,
            DependencyType::Requires,
        )
    }

    /// Storage key; at most one edge exists per ordered agent pair.
    pub fn key(&self) -> String {
        edge_key(&self.dependent, &self.dependency)
    }
}

/// Storage key for the edge between an ordered pair of agents.
///
/// The dependent's byte length prefixes the key, so distinct pairs never
/// collide whatever characters the names contain.
pub fn edge_key(dependent: &AgentName, dependency: &AgentName) -> String {
    format!("{}:{}->{}", dependent.as_str().len(), dependent, dependency)
}
