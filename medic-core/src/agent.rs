//! Agent and version history entities.
//!
//! An agent is created on its first version record and is never hard-deleted.
//! Version records are immutable once created: later records supersede them,
//! and a rollback only moves the current-version pointer.

use crate::{
    compute_content_hash, AgentName, ChangeType, ContentHash, RollbackSafety, SemVer, Timestamp,
    VersionError,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A single immutable entry in an agent's version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: SemVer,
    /// Version the current pointer was at when this record was created
    pub previous_version: SemVer,
    pub change_type: ChangeType,
    pub description: String,
    /// Human-readable breaking change descriptors
    pub breaking_changes: Vec<String>,
    /// Hash of the agent's code at this version
    pub content_hash: ContentHash,
    /// Hash of the backup snapshot taken before the pointer advanced
    pub backup_hash: ContentHash,
    pub migration_required: bool,
    /// Generated migration script stub, present when `migration_required`
    pub migration_script: Option<String>,
    pub created_at: Timestamp,
}

/// Audit entry for a logical rollback of the current-version pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackEvent {
    pub from_version: SemVer,
    pub to_version: SemVer,
    pub safety: RollbackSafety,
    pub forced: bool,
    pub rolled_back_at: Timestamp,
}

/// A managed agent with its full version history.
///
/// Dependency edges are stored in their own collection and are not embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub name: AgentName,
    pub current_version: SemVer,
    /// Hash of the code currently deployed at `current_version`
    pub current_hash: ContentHash,
    /// Records in creation order
    pub history: Vec<VersionRecord>,
    pub rollbacks: Vec<RollbackEvent>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Agent {
    /// Initialize a new agent at `0.0.0` with empty code.
    pub fn new(name: impl Into<AgentName>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            current_version: SemVer::ZERO,
            current_hash: compute_content_hash(b""),
            history: Vec::new(),
            rollbacks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up the record for a specific version.
    pub fn record(&self, version: SemVer) -> Option<&VersionRecord> {
        self.history.iter().find(|r| r.version == version)
    }

    /// Highest version ever recorded, including rolled-back records.
    pub fn highest_recorded_version(&self) -> SemVer {
        self.history
            .iter()
            .map(|r| r.version)
            .max()
            .unwrap_or(SemVer::ZERO)
            .max(self.current_version)
    }

    /// Compute the version a change of `change_type` would produce.
    ///
    /// The bump is applied to the highest recorded version rather than the
    /// current pointer so that numbering stays monotonic after a rollback and
    /// never reuses a superseded version number.
    pub fn next_version(&self, change_type: ChangeType) -> Result<SemVer, VersionError> {
        self.highest_recorded_version().bump(change_type)
    }

    /// Whether `version` is a known state of this agent.
    pub fn has_version(&self, version: SemVer) -> bool {
        version == SemVer::ZERO || self.record(version).is_some()
    }

    /// Records a rollback to `target` would revert, newest first.
    ///
    /// Every recorded version with `target < version <= current_version` is
    /// included, whether or not it sits on the current `previous_version`
    /// lineage.
    pub fn records_reverted_by(&self, target: SemVer) -> Vec<&VersionRecord> {
        let mut reverted: Vec<&VersionRecord> = self
            .history
            .iter()
            .filter(|r| r.version > target && r.version <= self.current_version)
            .collect();
        reverted.sort_by(|a, b| b.version.cmp(&a.version));
        reverted
    }

    /// Hash of the code snapshot representing `version`.
    ///
    /// For a recorded version this is the record's content hash. For the
    /// initial `0.0.0` state it is the backup taken before the first record.
    pub fn state_hash_at(&self, version: SemVer) -> Option<ContentHash> {
        if let Some(record) = self.record(version) {
            return Some(record.content_hash);
        }
        if version == SemVer::ZERO {
            return match self.history.first() {
                Some(first) => Some(first.backup_hash),
                None => Some(self.current_hash),
            };
        }
        None
    }
}

/// Content-addressed backup of an agent's code at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub hash: ContentHash,
    pub agent: AgentName,
    /// Version the agent was at when the snapshot was taken
    pub version: SemVer,
    pub content: String,
    pub created_at: Timestamp,
}

impl BackupSnapshot {
    pub fn new(agent: AgentName, version: SemVer, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            hash: compute_content_hash(content.as_bytes()),
            agent,
            version,
            content,
            created_at: Utc::now(),
        }
    }

    /// Verify that the stored content still matches its address.
    pub fn is_intact(&self) -> bool {
        compute_content_hash(self.content.as_bytes()) == self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: SemVer, previous: SemVer, breaking: bool) -> VersionRecord {
        VersionRecord {
            version,
            previous_version: previous,
            change_type: ChangeType::Patch,
            description: format!("release {}", version),
            breaking_changes: if breaking {
                vec!["removed fetch()".to_string()]
            } else {
                vec![]
            },
            content_hash: compute_content_hash(version.to_string().as_bytes()),
            backup_hash: compute_content_hash(previous.to_string().as_bytes()),
            migration_required: breaking,
            migration_script: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_agent_starts_at_zero() {
        let agent = Agent::new("renderer");
        assert_eq!(agent.current_version, SemVer::ZERO);
        assert!(agent.history.is_empty());
        assert_eq!(agent.next_version(ChangeType::Patch).unwrap(), SemVer::new(0, 0, 1));
        assert!(agent.has_version(SemVer::ZERO));
    }

    #[test]
    fn test_next_version_skips_rolled_back_numbers() {
        let mut agent = Agent::new("renderer");
        let v1 = SemVer::new(0, 0, 1);
        let v2 = SemVer::new(0, 0, 2);
        agent.history.push(record(v1, SemVer::ZERO, false));
        agent.history.push(record(v2, v1, false));
        agent.current_version = v1;
        assert_eq!(agent.next_version(ChangeType::Patch).unwrap(), SemVer::new(0, 0, 3));
    }

    #[test]
    fn test_records_reverted_cover_whole_range() {
        let mut agent = Agent::new("extractor");
        let v1 = SemVer::new(0, 1, 0);
        let v2 = SemVer::new(0, 2, 0);
        let v3 = SemVer::new(0, 3, 0);
        let v4 = SemVer::new(0, 4, 0);
        agent.history.push(record(v1, SemVer::ZERO, false));
        agent.history.push(record(v2, v1, true));
        // v3 was created after a rollback to v1; v2 is still inside the range
        agent.history.push(record(v3, v1, false));
        agent.history.push(record(v4, v3, false));
        agent.current_version = v3;

        let reverted: Vec<SemVer> = agent
            .records_reverted_by(v1)
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(reverted, vec![v3, v2]);

        let to_zero: Vec<SemVer> = agent
            .records_reverted_by(SemVer::ZERO)
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(to_zero, vec![v3, v2, v1]);
    }

    #[test]
    fn test_state_hash_for_initial_version_uses_first_backup() {
        let mut agent = Agent::new("extractor");
        let v1 = SemVer::new(0, 0, 1);
        let first = record(v1, SemVer::ZERO, false);
        let backup = first.backup_hash;
        agent.history.push(first);
        assert_eq!(agent.state_hash_at(SemVer::ZERO), Some(backup));
        assert!(agent.state_hash_at(SemVer::new(9, 9, 9)).is_none());
    }

    #[test]
    fn test_backup_snapshot_integrity() {
        let mut snapshot =
            BackupSnapshot::new(AgentName::from("a"), SemVer::ZERO, "def run(): pass");
        assert!(snapshot.is_intact());
        snapshot.content.push_str("\n# tampered");
        assert!(!snapshot.is_intact());
    }
}
