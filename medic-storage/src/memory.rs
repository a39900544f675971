//! In-memory storage backend.
//!
//! Used by tests and by embedders that do not need durability. Each collection
//! sits behind its own `RwLock`; a poisoned lock surfaces as
//! [`StorageError::LockPoisoned`] rather than a panic.

use crate::{collections, next_stamp, resolution_key, Stamped, StorageTrait};
use medic_core::{
    content_hash_hex, edge_key, Agent, AgentName, BackupSnapshot, ContentHash, DependencyEdge,
    FixProposal, HealthReport, IssueType, MedicResult, ProposalId, Resolution, StorageError,
    WorkflowId, WorkflowRecord,
};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type StampedMap<K, V> = Arc<RwLock<HashMap<K, Stamped<V>>>>;

/// In-memory storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    agents: StampedMap<AgentName, Agent>,
    dependencies: Arc<RwLock<HashMap<String, DependencyEdge>>>,
    health_reports: Arc<RwLock<HashMap<AgentName, VecDeque<HealthReport>>>>,
    proposals: StampedMap<ProposalId, FixProposal>,
    workflows: StampedMap<WorkflowId, WorkflowRecord>,
    backups: Arc<RwLock<HashMap<ContentHash, BackupSnapshot>>>,
    resolutions: Arc<RwLock<HashMap<String, Vec<Resolution>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored backup snapshots.
    pub fn backup_count(&self) -> MedicResult<usize> {
        Ok(read(&self.backups)?.len())
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StorageError> {
    lock.read().map_err(|_| StorageError::LockPoisoned)
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StorageError> {
    lock.write().map_err(|_| StorageError::LockPoisoned)
}

/// Stamp-checked insert or replace under a single write lock.
fn put_stamped<K, V>(
    map: &RwLock<HashMap<K, Stamped<V>>>,
    collection: &'static str,
    key: K,
    value: &V,
    expected: Option<u64>,
) -> Result<u64, StorageError>
where
    K: Eq + Hash + ToString,
    V: Clone,
{
    let mut guard = write(map)?;
    let current = guard.get(&key).map(|s| s.stamp);
    let stamp = next_stamp(collection, &key.to_string(), current, expected)?;
    guard.insert(
        key,
        Stamped {
            stamp,
            value: value.clone(),
        },
    );
    Ok(stamp)
}

impl StorageTrait for MemoryStorage {
    // === Agents ===

    fn agent_get(&self, name: &AgentName) -> MedicResult<Option<Stamped<Agent>>> {
        Ok(read(&self.agents)?.get(name).cloned())
    }

    fn agent_put(&self, agent: &Agent, expected: Option<u64>) -> MedicResult<u64> {
        Ok(put_stamped(
            &self.agents,
            collections::AGENTS,
            agent.name.clone(),
            agent,
            expected,
        )?)
    }

    fn agent_list(&self) -> MedicResult<Vec<Agent>> {
        let mut agents: Vec<Agent> = read(&self.agents)?
            .values()
            .map(|s| s.value.clone())
            .collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(agents)
    }

    // === Dependencies ===

    fn dependency_put(&self, edge: &DependencyEdge) -> MedicResult<()> {
        write(&self.dependencies)?.insert(edge.key(), edge.clone());
        Ok(())
    }

    fn dependency_remove(
        &self,
        dependent: &AgentName,
        dependency: &AgentName,
    ) -> MedicResult<bool> {
        Ok(write(&self.dependencies)?
            .remove(&edge_key(dependent, dependency))
            .is_some())
    }

    fn dependency_list(&self) -> MedicResult<Vec<DependencyEdge>> {
        let mut edges: Vec<DependencyEdge> =
            read(&self.dependencies)?.values().cloned().collect();
        edges.sort_by(|a, b| {
            (&a.dependent, &a.dependency).cmp(&(&b.dependent, &b.dependency))
        });
        Ok(edges)
    }

    // === Health reports ===

    fn health_report_append(&self, report: &HealthReport, keep: usize) -> MedicResult<()> {
        let mut reports = write(&self.health_reports)?;
        let history = reports.entry(report.agent.clone()).or_default();
        history.push_back(report.clone());
        while history.len() > keep {
            history.pop_front();
        }
        Ok(())
    }

    fn health_report_list(&self, agent: &AgentName) -> MedicResult<Vec<HealthReport>> {
        Ok(read(&self.health_reports)?
            .get(agent)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default())
    }

    // === Fix proposals ===

    fn proposal_get(&self, id: ProposalId) -> MedicResult<Option<Stamped<FixProposal>>> {
        Ok(read(&self.proposals)?.get(&id).cloned())
    }

    fn proposal_put(&self, proposal: &FixProposal, expected: Option<u64>) -> MedicResult<u64> {
        Ok(put_stamped(
            &self.proposals,
            collections::FIX_PROPOSALS,
            proposal.proposal_id,
            proposal,
            expected,
        )?)
    }

    fn proposal_list(&self) -> MedicResult<Vec<FixProposal>> {
        let mut proposals: Vec<FixProposal> = read(&self.proposals)?
            .values()
            .map(|s| s.value.clone())
            .collect();
        proposals.sort_by_key(|p| p.proposal_id);
        Ok(proposals)
    }

    // === Workflows ===

    fn workflow_get(&self, id: WorkflowId) -> MedicResult<Option<Stamped<WorkflowRecord>>> {
        Ok(read(&self.workflows)?.get(&id).cloned())
    }

    fn workflow_put(&self, workflow: &WorkflowRecord, expected: Option<u64>) -> MedicResult<u64> {
        Ok(put_stamped(
            &self.workflows,
            collections::WORKFLOWS,
            workflow.workflow_id,
            workflow,
            expected,
        )?)
    }

    fn workflow_list(&self) -> MedicResult<Vec<WorkflowRecord>> {
        let mut workflows: Vec<WorkflowRecord> = read(&self.workflows)?
            .values()
            .map(|s| s.value.clone())
            .collect();
        workflows.sort_by_key(|w| w.workflow_id);
        Ok(workflows)
    }

    // === Backups ===

    fn backup_put(&self, snapshot: &BackupSnapshot) -> MedicResult<()> {
        write(&self.backups)?
            .entry(snapshot.hash)
            .or_insert_with(|| snapshot.clone());
        Ok(())
    }

    fn backup_get(&self, hash: &ContentHash) -> MedicResult<Option<BackupSnapshot>> {
        let backups = read(&self.backups)?;
        match backups.get(hash) {
            Some(snapshot) if !snapshot.is_intact() => Err(StorageError::Serialization {
                collection: collections::BACKUPS,
                reason: format!("snapshot {} failed integrity check", content_hash_hex(hash)),
            }
            .into()),
            other => Ok(other.cloned()),
        }
    }

    // === Resolutions ===

    fn resolution_append(&self, resolution: &Resolution) -> MedicResult<()> {
        write(&self.resolutions)?
            .entry(resolution_key(&resolution.agent, resolution.issue_type))
            .or_default()
            .push(resolution.clone());
        Ok(())
    }

    fn resolution_list(
        &self,
        agent: &AgentName,
        issue_type: IssueType,
    ) -> MedicResult<Vec<Resolution>> {
        Ok(read(&self.resolutions)?
            .get(&resolution_key(agent, issue_type))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medic_core::{MedicError, SemVer};

    #[test]
    fn test_agent_put_enforces_stamps() {
        let storage = MemoryStorage::new();
        let mut agent = Agent::new("renderer");

        let stamp = storage.agent_put(&agent, None).unwrap();
        assert_eq!(stamp, 1);

        agent.current_version = SemVer::new(0, 0, 1);
        let stamp = storage.agent_put(&agent, Some(stamp)).unwrap();
        assert_eq!(stamp, 2);

        // A writer still holding stamp 1 loses.
        let err = storage.agent_put(&agent, Some(1)).unwrap_err();
        assert!(matches!(
            err,
            MedicError::Storage(StorageError::Conflict {
                expected: Some(1),
                actual: Some(2),
                ..
            })
        ));

        let stored = storage.agent_get(&agent.name).unwrap().unwrap();
        assert_eq!(stored.stamp, 2);
        assert_eq!(stored.value.current_version, SemVer::new(0, 0, 1));
    }

    #[test]
    fn test_health_history_is_bounded() {
        let storage = MemoryStorage::new();
        let agent = AgentName::from("extractor");
        let mut ids = Vec::new();
        for _ in 0..5 {
            let report = HealthReport::unknown(agent.clone());
            ids.push(report.report_id);
            storage.health_report_append(&report, 3).unwrap();
        }
        let history = storage.health_report_list(&agent).unwrap();
        let kept: Vec<_> = history.iter().map(|r| r.report_id).collect();
        assert_eq!(kept, ids[2..].to_vec());
    }

    #[test]
    fn test_dependency_replace_and_remove() {
        let storage = MemoryStorage::new();
        storage
            .dependency_put(&DependencyEdge::requires("api", "db"))
            .unwrap();
        storage
            .dependency_put(&DependencyEdge::requires("api", "db"))
            .unwrap();
        assert_eq!(storage.dependency_list().unwrap().len(), 1);

        assert!(storage
            .dependency_remove(&AgentName::from("api"), &AgentName::from("db"))
            .unwrap());
        assert!(!storage
            .dependency_remove(&AgentName::from("api"), &AgentName::from("db"))
            .unwrap());
    }

    #[test]
    fn test_arrow_in_agent_names_keeps_edges_apart() {
        let storage = MemoryStorage::new();
        storage
            .dependency_put(&DependencyEdge::requires("a->b", "c"))
            .unwrap();
        storage
            .dependency_put(&DependencyEdge::requires("a", "b->c"))
            .unwrap();
        assert_eq!(storage.dependency_list().unwrap().len(), 2);

        assert!(storage
            .dependency_remove(&AgentName::from("a"), &AgentName::from("b->c"))
            .unwrap());
        let remaining = storage.dependency_list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].dependent, AgentName::from("a->b"));
    }

    #[test]
    fn test_backups_are_content_addressed() {
        let storage = MemoryStorage::new();
        let a = BackupSnapshot::new(AgentName::from("a"), SemVer::ZERO, "code");
        let b = BackupSnapshot::new(AgentName::from("a"), SemVer::new(0, 0, 1), "code");
        storage.backup_put(&a).unwrap();
        storage.backup_put(&b).unwrap();
        assert_eq!(storage.backup_count().unwrap(), 1);
        let stored = storage.backup_get(&a.hash).unwrap().unwrap();
        assert_eq!(stored.version, SemVer::ZERO);
    }
}
