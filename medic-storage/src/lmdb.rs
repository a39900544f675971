//! LMDB-backed durable storage.
//!
//! Uses the heed crate (Rust bindings for LMDB). Each collection is a named
//! database with string keys and JSON values. LMDB allows a single writer at a
//! time, so the optimistic stamp check and the replace happen inside one write
//! transaction and cannot interleave with another writer.
//!
//! # Keys
//!
//! | Collection       | Key                          |
//! |------------------|------------------------------|
//! | `agents`         | agent name                   |
//! | `dependencies`   | `dependent->dependency`      |
//! | `health_reports` | agent name (bounded list)    |
//! | `fix_proposals`  | proposal id                  |
//! | `workflows`      | workflow id                  |
//! | `backups`        | hex SHA-256 of the content   |
//! | `resolutions`    | `agent/issue_type`           |

use crate::{collections, next_stamp, resolution_key, Stamped, StorageTrait};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use medic_core::{
    content_hash_hex, edge_key, Agent, AgentName, BackupSnapshot, ContentHash, DependencyEdge,
    FixProposal, HealthReport, IssueType, MedicError, MedicResult, ProposalId, Resolution,
    StorageError, WorkflowId, WorkflowRecord,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Error type for LMDB backend operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStorageError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open a named database within the environment.
    #[error("Failed to open database {name}: {reason}")]
    DbOpen { name: &'static str, reason: String },

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<heed::Error> for LmdbStorageError {
    fn from(e: heed::Error) -> Self {
        LmdbStorageError::Transaction(e.to_string())
    }
}

/// Convert LmdbStorageError to MedicError.
impl From<LmdbStorageError> for MedicError {
    fn from(e: LmdbStorageError) -> Self {
        MedicError::Storage(StorageError::TransactionFailed {
            reason: e.to_string(),
        })
    }
}

/// Stamp header read without decoding the full record.
#[derive(Deserialize)]
struct StampHeader {
    stamp: u64,
}

type JsonDb = Database<Str, Bytes>;

/// LMDB-backed storage.
///
/// # Example
///
/// ```ignore
/// use medic_storage::{LmdbStorage, StorageTrait};
///
/// let storage = LmdbStorage::open("/var/lib/medic", 256)?;
/// let agents = storage.agent_list()?;
/// ```
pub struct LmdbStorage {
    env: Env,
    agents: JsonDb,
    dependencies: JsonDb,
    health_reports: JsonDb,
    proposals: JsonDb,
    workflows: JsonDb,
    backups: JsonDb,
    resolutions: JsonDb,
}

impl LmdbStorage {
    /// Open (or create) the environment at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `map_size_mb` - Maximum size of the environment in megabytes
    pub fn open<P: AsRef<Path>>(path: P, map_size_mb: usize) -> Result<Self, LmdbStorageError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size_mb * 1024 * 1024)
                .max_dbs(collections::ALL.len() as u32)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStorageError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn()?;
        let mut create = |name: &'static str| -> Result<JsonDb, LmdbStorageError> {
            env.create_database(&mut wtxn, Some(name))
                .map_err(|e| LmdbStorageError::DbOpen {
                    name,
                    reason: e.to_string(),
                })
        };
        let agents = create(collections::AGENTS)?;
        let dependencies = create(collections::DEPENDENCIES)?;
        let health_reports = create(collections::HEALTH_REPORTS)?;
        let proposals = create(collections::FIX_PROPOSALS)?;
        let workflows = create(collections::WORKFLOWS)?;
        let backups = create(collections::BACKUPS)?;
        let resolutions = create(collections::RESOLUTIONS)?;
        wtxn.commit()?;

        debug!(path = %path.as_ref().display(), map_size_mb, "opened lmdb storage");

        Ok(Self {
            env,
            agents,
            dependencies,
            health_reports,
            proposals,
            workflows,
            backups,
            resolutions,
        })
    }

    fn read_txn(&self) -> Result<RoTxn<'_>, LmdbStorageError> {
        Ok(self.env.read_txn()?)
    }

    fn write_txn(&self) -> Result<RwTxn<'_>, LmdbStorageError> {
        Ok(self.env.write_txn()?)
    }
}

// ============================================================================
// JSON HELPERS
// ============================================================================

fn encode<T: Serialize>(collection: &'static str, value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|e| StorageError::Serialization {
        collection,
        reason: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(collection: &'static str, bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization {
        collection,
        reason: e.to_string(),
    })
}

fn get_json<T: DeserializeOwned>(
    db: JsonDb,
    txn: &RoTxn<'_>,
    collection: &'static str,
    key: &str,
) -> MedicResult<Option<T>> {
    match db.get(txn, key).map_err(LmdbStorageError::from)? {
        Some(bytes) => Ok(Some(decode(collection, bytes)?)),
        None => Ok(None),
    }
}

fn list_json<T: DeserializeOwned>(
    db: JsonDb,
    txn: &RoTxn<'_>,
    collection: &'static str,
) -> MedicResult<Vec<T>> {
    let mut values = Vec::new();
    for entry in db.iter(txn).map_err(LmdbStorageError::from)? {
        let (_, bytes) = entry.map_err(LmdbStorageError::from)?;
        values.push(decode(collection, bytes)?);
    }
    Ok(values)
}

impl LmdbStorage {
    fn get_stamped<T: DeserializeOwned>(
        &self,
        db: JsonDb,
        collection: &'static str,
        key: &str,
    ) -> MedicResult<Option<Stamped<T>>> {
        let rtxn = self.read_txn()?;
        get_json(db, &rtxn, collection, key)
    }

    fn put_stamped<T: Serialize>(
        &self,
        db: JsonDb,
        collection: &'static str,
        key: &str,
        value: &T,
        expected: Option<u64>,
    ) -> MedicResult<u64> {
        let mut wtxn = self.write_txn()?;
        let current = match db.get(&wtxn, key).map_err(LmdbStorageError::from)? {
            Some(bytes) => Some(decode::<StampHeader>(collection, bytes)?.stamp),
            None => None,
        };
        let stamp = next_stamp(collection, key, current, expected)?;
        let bytes = encode(collection, &Stamped { stamp, value })?;
        db.put(&mut wtxn, key, &bytes)
            .map_err(LmdbStorageError::from)?;
        wtxn.commit().map_err(LmdbStorageError::from)?;
        Ok(stamp)
    }

    fn list_stamped<T: DeserializeOwned>(
        &self,
        db: JsonDb,
        collection: &'static str,
    ) -> MedicResult<Vec<T>> {
        let rtxn = self.read_txn()?;
        let stamped: Vec<Stamped<T>> = list_json(db, &rtxn, collection)?;
        Ok(stamped.into_iter().map(|s| s.value).collect())
    }
}

impl StorageTrait for LmdbStorage {
    // === Agents ===

    fn agent_get(&self, name: &AgentName) -> MedicResult<Option<Stamped<Agent>>> {
        self.get_stamped(self.agents, collections::AGENTS, name.as_str())
    }

    fn agent_put(&self, agent: &Agent, expected: Option<u64>) -> MedicResult<u64> {
        self.put_stamped(
            self.agents,
            collections::AGENTS,
            agent.name.as_str(),
            agent,
            expected,
        )
    }

    fn agent_list(&self) -> MedicResult<Vec<Agent>> {
        // LMDB iterates in key order, which is agent-name order.
        self.list_stamped(self.agents, collections::AGENTS)
    }

    // === Dependencies ===

    fn dependency_put(&self, edge: &DependencyEdge) -> MedicResult<()> {
        let bytes = encode(collections::DEPENDENCIES, edge)?;
        let mut wtxn = self.write_txn()?;
        self.dependencies
            .put(&mut wtxn, &edge.key(), &bytes)
            .map_err(LmdbStorageError::from)?;
        wtxn.commit().map_err(LmdbStorageError::from)?;
        Ok(())
    }

    fn dependency_remove(
        &self,
        dependent: &AgentName,
        dependency: &AgentName,
    ) -> MedicResult<bool> {
        let mut wtxn = self.write_txn()?;
        let removed = self
            .dependencies
            .delete(&mut wtxn, &edge_key(dependent, dependency))
            .map_err(LmdbStorageError::from)?;
        wtxn.commit().map_err(LmdbStorageError::from)?;
        Ok(removed)
    }

    fn dependency_list(&self) -> MedicResult<Vec<DependencyEdge>> {
        let rtxn = self.read_txn()?;
        list_json(self.dependencies, &rtxn, collections::DEPENDENCIES)
    }

    // === Health reports ===

    fn health_report_append(&self, report: &HealthReport, keep: usize) -> MedicResult<()> {
        let collection = collections::HEALTH_REPORTS;
        let key = report.agent.as_str();
        let mut wtxn = self.write_txn()?;
        let mut history: Vec<HealthReport> =
            match self.health_reports.get(&wtxn, key).map_err(LmdbStorageError::from)? {
                Some(bytes) => decode(collection, bytes)?,
                None => Vec::new(),
            };
        history.push(report.clone());
        if history.len() > keep {
            history.drain(..history.len() - keep);
        }
        let bytes = encode(collection, &history)?;
        self.health_reports
            .put(&mut wtxn, key, &bytes)
            .map_err(LmdbStorageError::from)?;
        wtxn.commit().map_err(LmdbStorageError::from)?;
        Ok(())
    }

    fn health_report_list(&self, agent: &AgentName) -> MedicResult<Vec<HealthReport>> {
        let rtxn = self.read_txn()?;
        Ok(
            get_json(self.health_reports, &rtxn, collections::HEALTH_REPORTS, agent.as_str())?
                .unwrap_or_default(),
        )
    }

    // === Fix proposals ===

    fn proposal_get(&self, id: ProposalId) -> MedicResult<Option<Stamped<FixProposal>>> {
        self.get_stamped(self.proposals, collections::FIX_PROPOSALS, &id.to_string())
    }

    fn proposal_put(&self, proposal: &FixProposal, expected: Option<u64>) -> MedicResult<u64> {
        self.put_stamped(
            self.proposals,
            collections::FIX_PROPOSALS,
            &proposal.proposal_id.to_string(),
            proposal,
            expected,
        )
    }

    fn proposal_list(&self) -> MedicResult<Vec<FixProposal>> {
        self.list_stamped(self.proposals, collections::FIX_PROPOSALS)
    }

    // === Workflows ===

    fn workflow_get(&self, id: WorkflowId) -> MedicResult<Option<Stamped<WorkflowRecord>>> {
        self.get_stamped(self.workflows, collections::WORKFLOWS, &id.to_string())
    }

    fn workflow_put(&self, workflow: &WorkflowRecord, expected: Option<u64>) -> MedicResult<u64> {
        self.put_stamped(
            self.workflows,
            collections::WORKFLOWS,
            &workflow.workflow_id.to_string(),
            workflow,
            expected,
        )
    }

    fn workflow_list(&self) -> MedicResult<Vec<WorkflowRecord>> {
        self.list_stamped(self.workflows, collections::WORKFLOWS)
    }

    // === Backups ===

    fn backup_put(&self, snapshot: &BackupSnapshot) -> MedicResult<()> {
        let key = content_hash_hex(&snapshot.hash);
        let mut wtxn = self.write_txn()?;
        if self
            .backups
            .get(&wtxn, &key)
            .map_err(LmdbStorageError::from)?
            .is_none()
        {
            let bytes = encode(collections::BACKUPS, snapshot)?;
            self.backups
                .put(&mut wtxn, &key, &bytes)
                .map_err(LmdbStorageError::from)?;
        }
        wtxn.commit().map_err(LmdbStorageError::from)?;
        Ok(())
    }

    fn backup_get(&self, hash: &ContentHash) -> MedicResult<Option<BackupSnapshot>> {
        let rtxn = self.read_txn()?;
        let snapshot: Option<BackupSnapshot> =
            get_json(self.backups, &rtxn, collections::BACKUPS, &content_hash_hex(hash))?;
        match snapshot {
            Some(s) if !s.is_intact() => Err(StorageError::Serialization {
                collection: collections::BACKUPS,
                reason: format!("snapshot {} failed integrity check", content_hash_hex(hash)),
            }
            .into()),
            other => Ok(other),
        }
    }

    // === Resolutions ===

    fn resolution_append(&self, resolution: &Resolution) -> MedicResult<()> {
        let collection = collections::RESOLUTIONS;
        let key = resolution_key(&resolution.agent, resolution.issue_type);
        let mut wtxn = self.write_txn()?;
        let mut list: Vec<Resolution> =
            match self.resolutions.get(&wtxn, &key).map_err(LmdbStorageError::from)? {
                Some(bytes) => decode(collection, bytes)?,
                None => Vec::new(),
            };
        list.push(resolution.clone());
        let bytes = encode(collection, &list)?;
        self.resolutions
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbStorageError::from)?;
        wtxn.commit().map_err(LmdbStorageError::from)?;
        Ok(())
    }

    fn resolution_list(
        &self,
        agent: &AgentName,
        issue_type: IssueType,
    ) -> MedicResult<Vec<Resolution>> {
        let rtxn = self.read_txn()?;
        Ok(get_json(
            self.resolutions,
            &rtxn,
            collections::RESOLUTIONS,
            &resolution_key(agent, issue_type),
        )?
        .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use medic_core::{ChangeType, RemediationAction, SemVer};
    use tempfile::TempDir;

    fn create_test_storage() -> (LmdbStorage, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let storage =
            LmdbStorage::open(temp_dir.path(), 10).expect("storage creation should succeed");
        (storage, temp_dir)
    }

    #[test]
    fn test_agent_roundtrip_with_stamps() {
        let (storage, _dir) = create_test_storage();
        let mut agent = Agent::new("renderer");
        assert_eq!(storage.agent_put(&agent, None).unwrap(), 1);

        agent.current_version = SemVer::new(0, 1, 0);
        assert_eq!(storage.agent_put(&agent, Some(1)).unwrap(), 2);

        let stored = storage
            .agent_get(&agent.name)
            .unwrap()
            .expect("agent should exist");
        assert_eq!(stored.stamp, 2);
        assert_eq!(stored.value, agent);
    }

    #[test]
    fn test_stale_write_leaves_record_untouched() {
        let (storage, _dir) = create_test_storage();
        let mut agent = Agent::new("renderer");
        storage.agent_put(&agent, None).unwrap();
        agent.current_version = SemVer::new(1, 0, 0);
        storage.agent_put(&agent, Some(1)).unwrap();

        let mut stale = agent.clone();
        stale.current_version = SemVer::new(9, 9, 9);
        let err = storage.agent_put(&stale, Some(1)).unwrap_err();
        assert!(matches!(
            err,
            MedicError::Storage(StorageError::Conflict { .. })
        ));
        let stored = storage.agent_get(&agent.name).unwrap().unwrap();
        assert_eq!(stored.value.current_version, SemVer::new(1, 0, 0));
    }

    #[test]
    fn test_agent_list_is_name_ordered() {
        let (storage, _dir) = create_test_storage();
        for name in ["zeta", "alpha", "mid"] {
            storage.agent_put(&Agent::new(name), None).unwrap();
        }
        let names: Vec<String> = storage
            .agent_list()
            .unwrap()
            .into_iter()
            .map(|a| a.name.into_inner())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_dependencies_and_backups() {
        let (storage, _dir) = create_test_storage();
        storage
            .dependency_put(&DependencyEdge::requires("api", "db"))
            .unwrap();
        storage
            .dependency_put(&DependencyEdge::requires("web", "api"))
            .unwrap();
        assert_eq!(storage.dependency_list().unwrap().len(), 2);
        assert!(storage
            .dependency_remove(&AgentName::from("web"), &AgentName::from("api"))
            .unwrap());
        assert_eq!(storage.dependency_list().unwrap().len(), 1);

        let snapshot = BackupSnapshot::new(AgentName::from("api"), SemVer::ZERO, "def f(): pass");
        storage.backup_put(&snapshot).unwrap();
        let loaded = storage.backup_get(&snapshot.hash).unwrap().unwrap();
        assert_eq!(loaded.content, "def f(): pass");
        assert!(storage.backup_get(&[0u8; 32]).unwrap().is_none());
    }

    #[test]
    fn test_health_history_and_resolutions() {
        let (storage, _dir) = create_test_storage();
        let agent = AgentName::from("extractor");
        for _ in 0..4 {
            storage
                .health_report_append(&HealthReport::unknown(agent.clone()), 2)
                .unwrap();
        }
        assert_eq!(storage.health_report_list(&agent).unwrap().len(), 2);

        let resolution = Resolution {
            agent: agent.clone(),
            issue_type: IssueType::Timeout,
            fix_title: "Raise timeout budget".to_string(),
            steps: vec![],
            action: RemediationAction::CreateVersion {
                change_type: ChangeType::Patch,
                description: "raise timeout".to_string(),
            },
            workflow_id: WorkflowId::now_v7(),
            resolved_at: Utc::now(),
        };
        storage.resolution_append(&resolution).unwrap();
        assert_eq!(
            storage
                .resolution_list(&agent, IssueType::Timeout)
                .unwrap(),
            vec![resolution]
        );
        assert!(storage
            .resolution_list(&agent, IssueType::HighErrorRate)
            .unwrap()
            .is_empty());
    }
}
