//! Error types for MEDIC operations

use crate::{
    AgentName, ChangeType, ProposalId, RollbackSafety, SemVer, TestStage, WorkflowId,
    WorkflowStatus,
};
use std::time::Duration;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found in {collection}: {key}")]
    NotFound { collection: &'static str, key: String },

    #[error("Record already exists in {collection}: {key}")]
    AlreadyExists { collection: &'static str, key: String },

    /// Optimistic concurrency check failed: another writer updated the record.
    #[error("Stale write to {collection}/{key}: expected stamp {expected:?}, found {actual:?}")]
    Conflict {
        collection: &'static str,
        key: String,
        expected: Option<u64>,
        actual: Option<u64>,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Serialization failed for {collection}: {reason}")]
    Serialization {
        collection: &'static str,
        reason: String,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Version Control Engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("Agent not found: {agent}")]
    AgentNotFound { agent: AgentName },

    #[error("Version {version} not found for agent {agent}")]
    VersionNotFound { agent: AgentName, version: SemVer },

    #[error("Rollback of {agent} to {target} is {safety}; pass force to override")]
    UnsafeRollback {
        agent: AgentName,
        target: SemVer,
        safety: RollbackSafety,
    },

    #[error("Backup snapshot {hash} for {agent}@{version} is unavailable")]
    BackupUnavailable {
        agent: AgentName,
        version: SemVer,
        hash: String,
    },

    #[error("Invalid rollback target for {agent}: {target} is not older than current {current}")]
    InvalidRollbackTarget {
        agent: AgentName,
        current: SemVer,
        target: SemVer,
    },

    #[error("A {change_type} bump of {version} overflows")]
    VersionOverflow {
        version: SemVer,
        change_type: ChangeType,
    },
}

/// Dependency graph errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Agent {agent} cannot depend on itself")]
    SelfDependency { agent: AgentName },

    #[error("No dependency edge from {dependent} to {dependency}")]
    EdgeNotFound {
        dependent: AgentName,
        dependency: AgentName,
    },
}

/// Breaking change detector errors.
///
/// These are recovered locally: a parse failure skips the diff and is
/// reported as a warning, never as a failed version creation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Failed to parse {snapshot} snapshot at line {line}: {reason}")]
    CodeParse {
        snapshot: &'static str,
        line: usize,
        reason: String,
    },
}

/// Remediation workflow errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Invalid workflow transition for {workflow_id}: {from} -> {to}")]
    InvalidTransition {
        workflow_id: WorkflowId,
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    #[error("Fix proposal not found: {proposal_id}")]
    ProposalNotFound { proposal_id: ProposalId },

    #[error("Workflow not found: {workflow_id}")]
    WorkflowNotFound { workflow_id: WorkflowId },

    #[error("Proposal {proposal_id} cannot move from {from} to {to}")]
    InvalidProposalTransition {
        proposal_id: ProposalId,
        from: String,
        to: String,
    },

    #[error("Proposal {proposal_id} is not deployment ready: {reason}")]
    NotDeploymentReady {
        proposal_id: ProposalId,
        reason: String,
    },

    #[error("Verification for {workflow_id} requires a health report newer than implementation")]
    VerificationEvidenceMissing { workflow_id: WorkflowId },
}

/// Testing pipeline errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Test stage {stage} timed out after {timeout:?}")]
    TestStageTimeout { stage: TestStage, timeout: Duration },

    #[error("Test runner failed in stage {stage}: {reason}")]
    RunnerFailed { stage: TestStage, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration file path (set MEDIC_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Input validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid semantic version: {input}")]
    InvalidVersion { input: String },

    #[error("Invalid version constraint: {input}")]
    InvalidConstraint { input: String },
}

/// Master error type for all MEDIC errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MedicError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type alias for MEDIC operations.
pub type MedicResult<T> = Result<T, MedicError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_conflict() {
        let err = StorageError::Conflict {
            collection: "agents",
            key: "renderer".to_string(),
            expected: Some(3),
            actual: Some(4),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("agents/renderer"));
        assert!(msg.contains("Some(3)"));
        assert!(msg.contains("Some(4)"));
    }

    #[test]
    fn test_version_error_display_unsafe_rollback() {
        let err = VersionError::UnsafeRollback {
            agent: AgentName::from("extractor"),
            target: SemVer::new(1, 0, 0),
            safety: RollbackSafety::Dangerous,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("extractor"));
        assert!(msg.contains("1.0.0"));
        assert!(msg.contains("dangerous"));
        assert!(msg.contains("force"));
    }

    #[test]
    fn test_workflow_error_display_invalid_transition() {
        let err = WorkflowError::InvalidTransition {
            workflow_id: WorkflowId::new(uuid::Uuid::nil()),
            from: WorkflowStatus::PendingReview,
            to: WorkflowStatus::Verified,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("pending_review -> verified"));
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_pipeline_error_display_timeout() {
        let err = PipelineError::TestStageTimeout {
            stage: TestStage::Regression,
            timeout: Duration::from_secs(300),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("regression"));
        assert!(msg.contains("300s"));
    }

    #[test]
    fn test_medic_error_from_variants() {
        let storage = MedicError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, MedicError::Storage(_)));

        let version = MedicError::from(VersionError::AgentNotFound {
            agent: AgentName::from("ghost"),
        });
        assert!(matches!(version, MedicError::Version(_)));

        let graph = MedicError::from(GraphError::SelfDependency {
            agent: AgentName::from("loop"),
        });
        assert!(matches!(graph, MedicError::Graph(_)));

        let validation = MedicError::from(ValidationError::InvalidVersion {
            input: "1.x".to_string(),
        });
        assert!(matches!(validation, MedicError::Validation(_)));

        let config = MedicError::from(ConfigError::MissingConfigPath);
        assert!(matches!(config, MedicError::Config(_)));
    }
}
