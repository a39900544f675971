//! MEDIC Storage - Storage Trait and Backends
//!
//! Defines the persistence boundary for MEDIC collections. All file I/O is
//! confined to this crate. Writes are replace-on-write and guarded by
//! optimistic version stamps: a writer presents the stamp it read, and the
//! write fails with [`StorageError::Conflict`] if another writer got there first.

pub mod lmdb;
pub mod memory;

pub use lmdb::{LmdbStorage, LmdbStorageError};
pub use memory::MemoryStorage;

use medic_core::{
    Agent, AgentName, BackupSnapshot, ContentHash, DependencyEdge, FixProposal, HealthReport,
    IssueType, MedicResult, ProposalId, Resolution, StorageBackend, StorageConfig, StorageError,
    WorkflowId, WorkflowRecord,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// COLLECTIONS
// ============================================================================

/// Names of the persisted collections.
pub mod collections {
    pub const AGENTS: &str = "agents";
    pub const DEPENDENCIES: &str = "dependencies";
    pub const HEALTH_REPORTS: &str = "health_reports";
    pub const FIX_PROPOSALS: &str = "fix_proposals";
    pub const WORKFLOWS: &str = "workflows";
    pub const BACKUPS: &str = "backups";
    pub const RESOLUTIONS: &str = "resolutions";

    pub const ALL: [&str; 7] = [
        AGENTS,
        DEPENDENCIES,
        HEALTH_REPORTS,
        FIX_PROPOSALS,
        WORKFLOWS,
        BACKUPS,
        RESOLUTIONS,
    ];
}

// ============================================================================
// OPTIMISTIC STAMPS
// ============================================================================

/// A stored value together with its version stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    /// Starts at 1 on insert and increments on every successful replace
    pub stamp: u64,
    pub value: T,
}

/// Validate an optimistic write and return the stamp to store.
///
/// `expected = None` means "insert"; it fails if the key already exists.
/// `expected = Some(s)` means "replace the record I read at stamp `s`".
pub fn next_stamp(
    collection: &'static str,
    key: &str,
    current: Option<u64>,
    expected: Option<u64>,
) -> Result<u64, StorageError> {
    match (current, expected) {
        (None, None) => Ok(1),
        (Some(_), None) => Err(StorageError::AlreadyExists {
            collection,
            key: key.to_string(),
        }),
        (Some(actual), Some(expected)) if actual == expected => Ok(actual + 1),
        (actual, expected) => Err(StorageError::Conflict {
            collection,
            key: key.to_string(),
            expected,
            actual,
        }),
    }
}

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Storage trait for MEDIC collections.
///
/// Implementations must make every write atomic: a failed write leaves the
/// previous value in place.
pub trait StorageTrait: Send + Sync {
    // === Agents ===

    fn agent_get(&self, name: &AgentName) -> MedicResult<Option<Stamped<Agent>>>;

    /// Insert (`expected = None`) or replace an agent. Returns the new stamp.
    fn agent_put(&self, agent: &Agent, expected: Option<u64>) -> MedicResult<u64>;

    /// All agents, sorted by name.
    fn agent_list(&self) -> MedicResult<Vec<Agent>>;

    // === Dependencies ===

    /// Insert or replace the edge for the ordered pair.
    fn dependency_put(&self, edge: &DependencyEdge) -> MedicResult<()>;

    /// Remove an edge. Returns whether it existed.
    fn dependency_remove(&self, dependent: &AgentName, dependency: &AgentName)
        -> MedicResult<bool>;

    fn dependency_list(&self) -> MedicResult<Vec<DependencyEdge>>;

    // === Health reports ===

    /// Append a report, keeping only the newest `keep` for the agent.
    fn health_report_append(&self, report: &HealthReport, keep: usize) -> MedicResult<()>;

    /// Reports for an agent, oldest first.
    fn health_report_list(&self, agent: &AgentName) -> MedicResult<Vec<HealthReport>>;

    // === Fix proposals ===

    fn proposal_get(&self, id: ProposalId) -> MedicResult<Option<Stamped<FixProposal>>>;

    fn proposal_put(&self, proposal: &FixProposal, expected: Option<u64>) -> MedicResult<u64>;

    fn proposal_list(&self) -> MedicResult<Vec<FixProposal>>;

    // === Workflows ===

    fn workflow_get(&self, id: WorkflowId) -> MedicResult<Option<Stamped<WorkflowRecord>>>;

    fn workflow_put(&self, workflow: &WorkflowRecord, expected: Option<u64>) -> MedicResult<u64>;

    fn workflow_list(&self) -> MedicResult<Vec<WorkflowRecord>>;

    // === Backups ===

    /// Store a content-addressed snapshot. Storing the same content twice is a no-op.
    fn backup_put(&self, snapshot: &BackupSnapshot) -> MedicResult<()>;

    fn backup_get(&self, hash: &ContentHash) -> MedicResult<Option<BackupSnapshot>>;

    // === Resolutions ===

    fn resolution_append(&self, resolution: &Resolution) -> MedicResult<()>;

    /// Resolutions for an agent and issue type, oldest first.
    fn resolution_list(
        &self,
        agent: &AgentName,
        issue_type: IssueType,
    ) -> MedicResult<Vec<Resolution>>;
}

/// Open the backend selected by `config`.
pub fn open_storage(config: &StorageConfig) -> MedicResult<Arc<dyn StorageTrait>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageBackend::Lmdb => {
            let path = config.path.as_ref().ok_or(StorageError::TransactionFailed {
                reason: "lmdb backend requires storage.path".to_string(),
            })?;
            Ok(Arc::new(LmdbStorage::open(path, config.map_size_mb)?))
        }
    }
}

/// Key for resolutions grouped by agent and issue type.
pub(crate) fn resolution_key(agent: &AgentName, issue_type: IssueType) -> String {
    format!("{}/{}", agent, issue_type.as_db_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_stamp_insert_and_replace() {
        assert_eq!(next_stamp("agents", "a", None, None), Ok(1));
        assert_eq!(next_stamp("agents", "a", Some(4), Some(4)), Ok(5));
    }

    #[test]
    fn test_next_stamp_rejects_stale_writer() {
        let err = next_stamp("agents", "a", Some(5), Some(4)).unwrap_err();
        assert_eq!(
            err,
            StorageError::Conflict {
                collection: "agents",
                key: "a".to_string(),
                expected: Some(4),
                actual: Some(5),
            }
        );
        assert!(matches!(
            next_stamp("agents", "a", Some(1), None),
            Err(StorageError::AlreadyExists { .. })
        ));
        assert!(matches!(
            next_stamp("agents", "a", None, Some(1)),
            Err(StorageError::Conflict { actual: None, .. })
        ));
    }
}
