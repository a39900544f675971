//! Fix proposal and test pipeline report types

use crate::{
    AgentName, ChangeType, Issue, IssueType, ProposalId, ProposalStatus, RiskLevel, SemVer,
    TestOutcome, TestStage, Timestamp, WorkflowError, WorkflowId,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Where a fix option came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixSource {
    /// Generic template from the fix catalogue
    Template,
    /// A fix that previously resolved the same issue type on the same agent
    History,
}

/// The version-control action performed when a fix is implemented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemediationAction {
    CreateVersion {
        change_type: ChangeType,
        description: String,
    },
    Rollback {
        target: SemVer,
        force: bool,
    },
}

/// A candidate remediation for an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixOption {
    pub title: String,
    pub description: String,
    pub source: FixSource,
    pub risk_level: RiskLevel,
    pub steps: Vec<String>,
    pub estimated_effort_hours: f64,
    /// Probability in [0, 1] that the fix resolves the issue
    pub success_probability: f64,
    pub action: RemediationAction,
}

/// Combined risk score of a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Score in [0, 1]
    pub score: f64,
    pub level: RiskLevel,
    pub factors: Vec<String>,
}

/// Result of a single sub-test within a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTestResult {
    pub name: String,
    pub outcome: TestOutcome,
    pub message: Option<String>,
}

impl SubTestResult {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: TestOutcome::Pass,
            message: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: TestOutcome::Fail,
            message: Some(message.into()),
        }
    }

    pub fn skip(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: TestOutcome::Skip,
            message: Some(reason.into()),
        }
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: TestOutcome::Error,
            message: Some(message.into()),
        }
    }
}

/// Aggregated result of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: TestStage,
    pub outcome: TestOutcome,
    pub sub_tests: Vec<SubTestResult>,
    pub duration_ms: u64,
}

/// Result of running the testing pipeline for a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub proposal_id: ProposalId,
    /// Executed stages in order; stages after a failing one are absent
    pub stages: Vec<StageResult>,
    pub deployment_ready: bool,
    /// Non-blocking observations such as skipped stages
    pub caveats: Vec<String>,
    pub completed_at: Timestamp,
}

impl PipelineReport {
    pub fn stage(&self, stage: TestStage) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// First stage that did not pass or skip.
    pub fn first_blocking_stage(&self) -> Option<&StageResult> {
        self.stages
            .iter()
            .find(|s| matches!(s.outcome, TestOutcome::Fail | TestOutcome::Error))
    }
}

/// Ranked remediation candidates for a single issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixProposal {
    pub proposal_id: ProposalId,
    pub agent: AgentName,
    /// Snapshot of the issue that triggered the proposal
    pub issue: Issue,
    /// Ranked, best first
    pub options: Vec<FixOption>,
    /// Index into `options`
    pub recommended: usize,
    pub risk: RiskAssessment,
    pub implementation_plan: Vec<String>,
    pub test_plan: Vec<TestStage>,
    pub rollback_plan: Vec<String>,
    pub status: ProposalStatus,
    pub test_report: Option<PipelineReport>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FixProposal {
    pub fn recommended_option(&self) -> Option<&FixOption> {
        self.options.get(self.recommended)
    }

    /// Move the proposal to `next`, refusing transitions out of terminal states.
    pub fn transition(&mut self, next: ProposalStatus) -> Result<(), WorkflowError> {
        if self.status == next {
            return Ok(());
        }
        if self.status.is_terminal() || !self.status.can_transition_to(next) {
            return Err(WorkflowError::InvalidProposalTransition {
                proposal_id: self.proposal_id,
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// A fix that was verified to resolve an issue.
///
/// Recorded when a workflow reaches `Verified`; later proposals for the same
/// agent and issue type offer it as a proven solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub agent: AgentName,
    pub issue_type: IssueType,
    pub fix_title: String,
    pub steps: Vec<String>,
    pub action: RemediationAction,
    pub workflow_id: WorkflowId,
    pub resolved_at: Timestamp,
}
