//! Enum types for MEDIC entities
//!
//! Every status, severity and classification in the engine is a closed
//! enumeration. Database/wire names are snake_case and round-trip through
//! `as_db_str` / `FromStr`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error when parsing an invalid enum string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}

/// Implements `as_db_str`, `from_db_str`, `Display` and `FromStr` for a
/// fieldless enum. Parsing is case-insensitive and accepts `-` for `_`.
macro_rules! impl_db_str {
    ($ty:ident, $kind:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// Convert to database string representation.
            pub fn as_db_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s,)+
                }
            }

            /// Parse from database string representation.
            pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
                let normalized = s.trim().to_lowercase().replace('-', "_");
                match normalized.as_str() {
                    $($s => Ok($ty::$variant),)+
                    _ => Err(EnumParseError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_db_str())
            }
        }

        impl FromStr for $ty {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_db_str(s)
            }
        }
    };
}

// ============================================================================
// VERSIONING
// ============================================================================

/// Kind of semantic version increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Major,
    Minor,
    Patch,
}

impl_db_str!(ChangeType, "change type", {
    Major => "major",
    Minor => "minor",
    Patch => "patch",
});

/// Safety classification of reverting an agent across a version range.
///
/// Ordered from least to most dangerous so that the classification of a range
/// is the maximum over its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackSafety {
    /// No breaking changes or major bumps in the range
    Safe,
    /// A major bump or a migration-required version in the range
    Caution,
    /// A breaking change in the range
    Dangerous,
}

impl_db_str!(RollbackSafety, "rollback safety", {
    Safe => "safe",
    Caution => "caution",
    Dangerous => "dangerous",
});

// ============================================================================
// DEPENDENCIES
// ============================================================================

/// Type of a dependency edge between two agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Hard dependency; participates in cycle detection and ordering
    Requires,
    /// Soft dependency; checked for version satisfaction
    Recommends,
    /// The two agents must not be deployed together
    Conflicts,
    /// Optional enhancement
    Enhances,
}

impl_db_str!(DependencyType, "dependency type", {
    Requires => "requires",
    Recommends => "recommends",
    Conflicts => "conflicts",
    Enhances => "enhances",
});

impl DependencyType {
    /// Whether the dependency's version must satisfy the edge constraint.
    pub fn is_version_checked(&self) -> bool {
        matches!(self, DependencyType::Requires | DependencyType::Recommends)
    }

    /// Whether the dependency must be deployed before the dependent.
    pub fn implies_order(&self) -> bool {
        !matches!(self, DependencyType::Conflicts)
    }
}

// ============================================================================
// HEALTH
// ============================================================================

/// Derived health classification of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Unhealthy,
    Critical,
    /// No telemetry available yet
    #[default]
    Unknown,
}

impl_db_str!(HealthStatus, "health status", {
    Healthy => "healthy",
    Warning => "warning",
    Unhealthy => "unhealthy",
    Critical => "critical",
    Unknown => "unknown",
});

impl HealthStatus {
    /// Severity rank; higher is worse. Unknown ranks below Healthy so that any
    /// real observation overrides it.
    pub fn rank(&self) -> u8 {
        match self {
            HealthStatus::Unknown => 0,
            HealthStatus::Healthy => 1,
            HealthStatus::Warning => 2,
            HealthStatus::Unhealthy => 3,
            HealthStatus::Critical => 4,
        }
    }

    /// Raise this status to at least `floor`.
    pub fn at_least(self, floor: HealthStatus) -> HealthStatus {
        if floor.rank() > self.rank() {
            floor
        } else {
            self
        }
    }

    /// Whether the status warrants remediation.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            HealthStatus::Warning | HealthStatus::Unhealthy | HealthStatus::Critical
        )
    }
}

/// Direction of an agent's success rate over the telemetry window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl_db_str!(Trend, "trend", {
    Improving => "improving",
    Declining => "declining",
    Stable => "stable",
    InsufficientData => "insufficient_data",
});

/// Type of anomaly detected by the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    PerformanceDegradation,
    HighErrorRate,
    RecurringError,
    Timeout,
    ResourceExhaustion,
    SlaViolation,
    DependencyFailure,
    ConfigurationError,
}

impl_db_str!(IssueType, "issue type", {
    PerformanceDegradation => "performance_degradation",
    HighErrorRate => "high_error_rate",
    RecurringError => "recurring_error",
    Timeout => "timeout",
    ResourceExhaustion => "resource_exhaustion",
    SlaViolation => "sla_violation",
    DependencyFailure => "dependency_failure",
    ConfigurationError => "configuration_error",
});

impl IssueType {
    pub const ALL: [IssueType; 8] = [
        IssueType::PerformanceDegradation,
        IssueType::HighErrorRate,
        IssueType::RecurringError,
        IssueType::Timeout,
        IssueType::ResourceExhaustion,
        IssueType::SlaViolation,
        IssueType::DependencyFailure,
        IssueType::ConfigurationError,
    ];
}

/// Severity scale shared by issues and API changes.
///
/// Ordered so that `Critical` is the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl_db_str!(Severity, "severity", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

/// Severity of a classified API change.
pub type ChangeSeverity = Severity;

/// Urgency of a recommendation or pending workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl_db_str!(Priority, "priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

impl From<Severity> for Priority {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => Priority::Low,
            Severity::Medium => Priority::Medium,
            Severity::High => Priority::High,
            Severity::Critical => Priority::Urgent,
        }
    }
}

// ============================================================================
// REMEDIATION
// ============================================================================

/// Risk classification of a fix option or proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl_db_str!(RiskLevel, "risk level", {
    Low => "low",
    Medium => "medium",
    High => "high",
});

impl RiskLevel {
    /// Numeric weight used when combining risk factors.
    pub fn weight(&self) -> f64 {
        match self {
            RiskLevel::Low => 0.1,
            RiskLevel::Medium => 0.3,
            RiskLevel::High => 0.5,
        }
    }
}

/// Stage of the automated testing pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStage {
    StructuralValidation,
    Unit,
    Integration,
    Regression,
    Performance,
}

impl_db_str!(TestStage, "test stage", {
    StructuralValidation => "structural_validation",
    Unit => "unit",
    Integration => "integration",
    Regression => "regression",
    Performance => "performance",
});

impl TestStage {
    /// All stages in execution order.
    pub const ORDERED: [TestStage; 5] = [
        TestStage::StructuralValidation,
        TestStage::Unit,
        TestStage::Integration,
        TestStage::Regression,
        TestStage::Performance,
    ];
}

/// Outcome of a sub-test or a whole stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Pass,
    Fail,
    Skip,
    Error,
}

impl_db_str!(TestOutcome, "test outcome", {
    Pass => "pass",
    Fail => "fail",
    Skip => "skip",
    Error => "error",
});

/// Lifecycle status of a fix proposal.
///
/// ```text
/// Draft → Testing ─┬→ Ready → Submitted ─┬→ Approved → Implemented ─┬→ Verified
///                  └→ TestFailed         └→ Rejected                ├→ Failed
///                                                                   └→ RolledBack
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    #[default]
    Draft,
    Testing,
    Ready,
    TestFailed,
    Submitted,
    Approved,
    Rejected,
    Implemented,
    Verified,
    Failed,
    RolledBack,
}

impl_db_str!(ProposalStatus, "proposal status", {
    Draft => "draft",
    Testing => "testing",
    Ready => "ready",
    TestFailed => "test_failed",
    Submitted => "submitted",
    Approved => "approved",
    Rejected => "rejected",
    Implemented => "implemented",
    Verified => "verified",
    Failed => "failed",
    RolledBack => "rolled_back",
});

impl ProposalStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::TestFailed | ProposalStatus::Rejected | ProposalStatus::RolledBack
        )
    }

    /// Check whether a transition to `next` is allowed.
    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        use ProposalStatus::*;
        matches!(
            (self, next),
            (Draft, Testing)
                | (Testing, Ready)
                | (Testing, TestFailed)
                | (Ready, Testing)
                | (Ready, Submitted)
                | (Submitted, Approved)
                | (Submitted, Rejected)
                | (Approved, Implemented)
                | (Implemented, Verified)
                | (Implemented, Failed)
                | (Implemented, RolledBack)
                | (Verified, Failed)
                | (Verified, RolledBack)
                | (Failed, RolledBack)
        )
    }
}

/// Status of an approval workflow.
///
/// ```text
/// PendingReview → UnderReview ─┬→ Approved ───────────────┬→ Implemented ─┬→ Verified ─┬→ Failed
///                              ├→ ApprovedWithConditions ─┘               ├→ Failed    └→ RolledBack
///                              └→ Rejected (terminal)                     └→ RolledBack
/// Failed → RolledBack (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    PendingReview,
    UnderReview,
    Approved,
    ApprovedWithConditions,
    Rejected,
    Implemented,
    Verified,
    Failed,
    RolledBack,
}

impl_db_str!(WorkflowStatus, "workflow status", {
    PendingReview => "pending_review",
    UnderReview => "under_review",
    Approved => "approved",
    ApprovedWithConditions => "approved_with_conditions",
    Rejected => "rejected",
    Implemented => "implemented",
    Verified => "verified",
    Failed => "failed",
    RolledBack => "rolled_back",
});

impl WorkflowStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Rejected | WorkflowStatus::RolledBack)
    }

    /// Whether the workflow is still waiting on a human decision.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::PendingReview | WorkflowStatus::UnderReview
        )
    }

    /// Whether the workflow has been approved (with or without conditions).
    pub fn is_approved(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Approved | WorkflowStatus::ApprovedWithConditions
        )
    }

    /// Check whether a transition to `next` is allowed.
    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        match self {
            PendingReview => matches!(next, UnderReview),
            UnderReview => matches!(next, Approved | ApprovedWithConditions | Rejected),
            Approved | ApprovedWithConditions => matches!(next, Implemented),
            Implemented => matches!(next, Verified | Failed | RolledBack),
            Verified => matches!(next, Failed | RolledBack),
            Failed => matches!(next, RolledBack),
            Rejected | RolledBack => false,
        }
    }
}
