//! Dependency Tracker: owns the live graph.
//!
//! Readers clone an `Arc` to the current snapshot under a short read lock and
//! run their traversal lock-free. Mutations persist the edge, build a new
//! snapshot and swap it in under the write lock, so a reader never observes a
//! half-applied change and mutations are serialized against each other.

use crate::snapshot::{Cycle, GraphProjection, GraphSnapshot, ImpactReport};
use medic_core::{
    AgentName, DependencyEdge, GraphError, ImpactThresholds, MedicResult, SemVer, StorageError,
};
use medic_storage::StorageTrait;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

pub struct DependencyTracker {
    storage: Arc<dyn StorageTrait>,
    snapshot: RwLock<Arc<GraphSnapshot>>,
    thresholds: ImpactThresholds,
}

impl DependencyTracker {
    /// Load the graph from storage.
    pub fn load(storage: Arc<dyn StorageTrait>, thresholds: ImpactThresholds) -> MedicResult<Self> {
        let snapshot = Self::read_snapshot(storage.as_ref())?;
        Ok(Self {
            storage,
            snapshot: RwLock::new(Arc::new(snapshot)),
            thresholds,
        })
    }

    fn read_snapshot(storage: &dyn StorageTrait) -> MedicResult<GraphSnapshot> {
        let agents = storage.agent_list()?.into_iter().map(|a| a.name);
        Ok(GraphSnapshot::build(agents, storage.dependency_list()?))
    }

    /// Current immutable snapshot.
    pub fn snapshot(&self) -> MedicResult<Arc<GraphSnapshot>> {
        let guard = self
            .snapshot
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(Arc::clone(&guard))
    }

    /// Apply `change` to the current snapshot under the write lock.
    fn swap<F>(&self, change: F) -> MedicResult<Arc<GraphSnapshot>>
    where
        F: FnOnce(&GraphSnapshot) -> MedicResult<Option<GraphSnapshot>>,
    {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        if let Some(next) = change(&guard)? {
            *guard = Arc::new(next);
        }
        Ok(Arc::clone(&guard))
    }

    /// Add or replace an edge. Returns the cycles through the new edge, which
    /// are reported but not rejected.
    pub fn add_dependency(&self, edge: DependencyEdge) -> MedicResult<Vec<Cycle>> {
        if edge.dependent == edge.dependency {
            return Err(GraphError::SelfDependency {
                agent: edge.dependent,
            }
            .into());
        }
        let dependent = edge.dependent.clone();
        let dependency = edge.dependency.clone();
        let snapshot = self.swap(|current| {
            self.storage.dependency_put(&edge)?;
            Ok(Some(current.with_edge(edge.clone())))
        })?;
        info!(
            dependent = %dependent,
            dependency = %dependency,
            constraint = %edge.constraint,
            dependency_type = %edge.dependency_type,
            "dependency added"
        );

        let cycles: Vec<Cycle> = snapshot
            .detect_cycles()
            .into_iter()
            .filter(|cycle| {
                cycle
                    .windows(2)
                    .any(|pair| pair[0] == dependent && pair[1] == dependency)
            })
            .collect();
        for cycle in &cycles {
            warn!(
                cycle = %cycle.iter().map(AgentName::as_str).collect::<Vec<_>>().join(" -> "),
                "dependency cycle detected"
            );
        }
        Ok(cycles)
    }

    /// Remove the edge for the ordered pair.
    pub fn remove_dependency(&self, dependent: &AgentName, dependency: &AgentName) -> MedicResult<()> {
        if dependent == dependency {
            return Err(GraphError::SelfDependency {
                agent: dependent.clone(),
            }
            .into());
        }
        self.swap(|current| {
            if current.edge(dependent, dependency).is_none() {
                return Err(GraphError::EdgeNotFound {
                    dependent: dependent.clone(),
                    dependency: dependency.clone(),
                }
                .into());
            }
            self.storage.dependency_remove(dependent, dependency)?;
            Ok(Some(current.without_edge(dependent, dependency)))
        })?;
        info!(dependent = %dependent, dependency = %dependency, "dependency removed");
        Ok(())
    }

    /// Register an agent as a graph node. No-op if already known.
    pub fn ensure_agent(&self, agent: &AgentName) -> MedicResult<()> {
        self.swap(|current| {
            if current.contains(agent) {
                return Ok(None);
            }
            debug!(agent = %agent, "agent registered in dependency graph");
            Ok(Some(current.with_agent(agent.clone())))
        })?;
        Ok(())
    }

    /// Rebuild the snapshot from storage.
    pub fn reload(&self) -> MedicResult<()> {
        self.swap(|_| Ok(Some(Self::read_snapshot(self.storage.as_ref())?)))?;
        Ok(())
    }

    /// Edges where `agent` is the dependent.
    pub fn get_dependencies(&self, agent: &AgentName) -> MedicResult<Vec<DependencyEdge>> {
        Ok(self
            .snapshot()?
            .dependencies_of(agent)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Edges where `agent` is the dependency.
    pub fn get_dependents(&self, agent: &AgentName) -> MedicResult<Vec<DependencyEdge>> {
        Ok(self
            .snapshot()?
            .dependents_of(agent)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn detect_cycles(&self) -> MedicResult<Vec<Cycle>> {
        let cycles = self.snapshot()?.detect_cycles();
        if !cycles.is_empty() {
            warn!(count = cycles.len(), "dependency graph contains cycles");
        }
        Ok(cycles)
    }

    pub fn analyze_update_impact(
        &self,
        agent: &AgentName,
        new_version: SemVer,
    ) -> MedicResult<ImpactReport> {
        let report = self
            .snapshot()?
            .analyze_update_impact(agent, new_version, &self.thresholds);
        debug!(
            agent = %agent,
            version = %new_version,
            affected = report.total_affected,
            risk = %report.risk_level,
            "update impact analyzed"
        );
        Ok(report)
    }

    pub fn projection(&self) -> MedicResult<GraphProjection> {
        Ok(self.snapshot()?.projection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medic_core::{MedicError, RiskLevel};
    use medic_storage::MemoryStorage;

    fn tracker() -> (DependencyTracker, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let tracker =
            DependencyTracker::load(storage.clone(), ImpactThresholds::default()).unwrap();
        (tracker, storage)
    }

    #[test]
    fn test_add_dependency_persists_and_is_queryable() {
        let (tracker, storage) = tracker();
        tracker
            .add_dependency(DependencyEdge::requires("web", "api"))
            .unwrap();
        assert_eq!(storage.dependency_list().unwrap().len(), 1);

        let deps = tracker.get_dependencies(&AgentName::from("web")).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].dependency, AgentName::from("api"));

        let dependents = tracker.get_dependents(&AgentName::from("api")).unwrap();
        assert_eq!(dependents[0].dependent, AgentName::from("web"));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let (tracker, storage) = tracker();
        let err = tracker
            .add_dependency(DependencyEdge::requires("loop", "loop"))
            .unwrap_err();
        assert!(matches!(err, MedicError::Graph(GraphError::SelfDependency { .. })));
        assert!(storage.dependency_list().unwrap().is_empty());
    }

    #[test]
    fn test_closing_edge_reports_cycle() {
        let (tracker, _) = tracker();
        assert!(tracker
            .add_dependency(DependencyEdge::requires("A", "B"))
            .unwrap()
            .is_empty());
        assert!(tracker
            .add_dependency(DependencyEdge::requires("B", "C"))
            .unwrap()
            .is_empty());
        let cycles = tracker
            .add_dependency(DependencyEdge::requires("C", "A"))
            .unwrap();
        assert_eq!(cycles.len(), 1);
        let mut members: Vec<&str> = cycles[0][..3].iter().map(|n| n.as_str()).collect();
        members.sort();
        assert_eq!(members, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_remove_missing_edge_fails() {
        let (tracker, _) = tracker();
        let err = tracker
            .remove_dependency(&AgentName::from("a"), &AgentName::from("b"))
            .unwrap_err();
        assert!(matches!(err, MedicError::Graph(GraphError::EdgeNotFound { .. })));
    }

    #[test]
    fn test_snapshot_readers_keep_old_view() {
        let (tracker, _) = tracker();
        tracker
            .add_dependency(DependencyEdge::requires("api", "db"))
            .unwrap();
        let before = tracker.snapshot().unwrap();
        tracker
            .remove_dependency(&AgentName::from("api"), &AgentName::from("db"))
            .unwrap();
        assert_eq!(before.edges().len(), 1);
        assert!(tracker.snapshot().unwrap().edges().is_empty());
    }

    #[test]
    fn test_impact_uses_configured_thresholds() {
        let storage = Arc::new(MemoryStorage::new());
        let tracker = DependencyTracker::load(
            storage,
            ImpactThresholds {
                high_affected: 1,
                medium_affected: 0,
            },
        )
        .unwrap();
        tracker
            .add_dependency(DependencyEdge::requires("a", "core"))
            .unwrap();
        tracker
            .add_dependency(DependencyEdge::requires("b", "core"))
            .unwrap();
        let report = tracker
            .analyze_update_impact(&AgentName::from("core"), SemVer::new(1, 0, 0))
            .unwrap();
        assert_eq!(report.risk_level, RiskLevel::High);
    }
}
