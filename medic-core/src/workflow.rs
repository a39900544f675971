//! Approval workflow records as an append-only event log.
//!
//! The current state of a workflow is never stored directly: it is a fold over
//! the review history. Appending validates the transition against the folded
//! state first, so an invalid transition leaves the log untouched.
//!
//! # State Transition Diagram
//!
//! ```text
//! submit() → PendingReview → start_review → UnderReview ─┬→ Approved ──────────────┬→ Implemented
//!                                                        ├→ ApprovedWithConditions ┘       │
//!                                                        └→ Rejected (terminal)            │
//! Implemented ─┬→ Verified ─┬→ Failed ─→ RolledBack (terminal)                              │
//!              ├→ Failed    └→ RolledBack                                                  │
//!              └→ RolledBack ←─────────────────────────────────────────────────────────────┘
//! ```

use crate::{
    AgentName, HealthStatus, IssueType, Priority, ProposalId, RemediationAction, ReportId, SemVer,
    Timestamp, WorkflowError, WorkflowId, WorkflowStatus,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Outcome of invoking the version control engine for an approved fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationResult {
    pub action: RemediationAction,
    pub version_before: SemVer,
    pub version_after: SemVer,
    pub details: String,
    pub implemented_at: Timestamp,
}

/// Outcome of the post-deployment verification step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub issue_resolved: bool,
    pub health_status: HealthStatus,
    pub report_id: Option<ReportId>,
    pub verified_at: Timestamp,
}

/// An action recorded in the review history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkflowAction {
    Submitted { priority: Priority },
    ReviewStarted { reviewer: String },
    Approved,
    ApprovedWithConditions { conditions: Vec<String> },
    Rejected { reason: String },
    Implemented { result: ImplementationResult },
    Verified { result: VerificationResult },
    Failed { reason: String },
    RolledBack { restored_version: Option<SemVer> },
}

impl WorkflowAction {
    /// Status the workflow is in after this action.
    pub fn target_status(&self) -> WorkflowStatus {
        match self {
            WorkflowAction::Submitted { .. } => WorkflowStatus::PendingReview,
            WorkflowAction::ReviewStarted { .. } => WorkflowStatus::UnderReview,
            WorkflowAction::Approved => WorkflowStatus::Approved,
            WorkflowAction::ApprovedWithConditions { .. } => WorkflowStatus::ApprovedWithConditions,
            WorkflowAction::Rejected { .. } => WorkflowStatus::Rejected,
            WorkflowAction::Implemented { .. } => WorkflowStatus::Implemented,
            WorkflowAction::Verified { .. } => WorkflowStatus::Verified,
            WorkflowAction::Failed { .. } => WorkflowStatus::Failed,
            WorkflowAction::RolledBack { .. } => WorkflowStatus::RolledBack,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowAction::Submitted { .. } => "submitted",
            WorkflowAction::ReviewStarted { .. } => "review_started",
            WorkflowAction::Approved => "approved",
            WorkflowAction::ApprovedWithConditions { .. } => "approved_with_conditions",
            WorkflowAction::Rejected { .. } => "rejected",
            WorkflowAction::Implemented { .. } => "implemented",
            WorkflowAction::Verified { .. } => "verified",
            WorkflowAction::Failed { .. } => "failed",
            WorkflowAction::RolledBack { .. } => "rolled_back",
        }
    }
}

/// Immutable audit entry. Never pruned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub sequence: u64,
    pub actor: String,
    pub action: WorkflowAction,
    pub notes: String,
    pub recorded_at: Timestamp,
}

/// State derived by folding a review history.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkflowState {
    pub status: WorkflowStatus,
    pub reviewer: Option<String>,
    pub conditions: Vec<String>,
    pub implementation: Option<ImplementationResult>,
    pub verification: Option<VerificationResult>,
    pub failure_reason: Option<String>,
}

impl WorkflowState {
    /// Fold a review history into its current state.
    pub fn fold(history: &[ReviewEntry]) -> Self {
        history.iter().fold(WorkflowState::default(), |mut state, entry| {
            state.status = entry.action.target_status();
            match &entry.action {
                WorkflowAction::ReviewStarted { reviewer } => {
                    state.reviewer = Some(reviewer.clone());
                }
                WorkflowAction::ApprovedWithConditions { conditions } => {
                    state.conditions = conditions.clone();
                }
                WorkflowAction::Implemented { result } => {
                    state.implementation = Some(result.clone());
                }
                WorkflowAction::Verified { result } => {
                    state.verification = Some(result.clone());
                }
                WorkflowAction::Failed { reason } | WorkflowAction::Rejected { reason } => {
                    state.failure_reason = Some(reason.clone());
                }
                WorkflowAction::Submitted { .. }
                | WorkflowAction::Approved
                | WorkflowAction::RolledBack { .. } => {}
            }
            state
        })
    }
}

/// One approval workflow per submitted fix proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub workflow_id: WorkflowId,
    pub proposal_id: ProposalId,
    pub agent: AgentName,
    pub issue_type: IssueType,
    pub priority: Priority,
    pub created_at: Timestamp,
    /// Append-only review history
    pub history: Vec<ReviewEntry>,
}

impl WorkflowRecord {
    /// Create a workflow in `PendingReview` with its submission entry.
    pub fn submit(
        proposal_id: ProposalId,
        agent: AgentName,
        issue_type: IssueType,
        priority: Priority,
        actor: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            workflow_id: WorkflowId::now_v7(),
            proposal_id,
            agent,
            issue_type,
            priority,
            created_at: now,
            history: vec![ReviewEntry {
                sequence: 0,
                actor: actor.into(),
                action: WorkflowAction::Submitted { priority },
                notes: notes.into(),
                recorded_at: now,
            }],
        }
    }

    pub fn state(&self) -> WorkflowState {
        WorkflowState::fold(&self.history)
    }

    pub fn status(&self) -> WorkflowStatus {
        self.history
            .last()
            .map(|entry| entry.action.target_status())
            .unwrap_or_default()
    }

    /// Append an action after validating the transition.
    ///
    /// On error the history is left unchanged.
    pub fn apply(
        &mut self,
        actor: impl Into<String>,
        action: WorkflowAction,
        notes: impl Into<String>,
    ) -> Result<WorkflowStatus, WorkflowError> {
        let from = self.status();
        let to = action.target_status();
        if !from.can_transition_to(to) {
            return Err(WorkflowError::InvalidTransition {
                workflow_id: self.workflow_id,
                from,
                to,
            });
        }
        self.history.push(ReviewEntry {
            sequence: self.history.len() as u64,
            actor: actor.into(),
            action,
            notes: notes.into(),
            recorded_at: Utc::now(),
        });
        Ok(to)
    }
}
