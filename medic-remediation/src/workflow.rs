//! Approval Workflow.
//!
//! Drives a submitted proposal through human review, implementation via the
//! version control engine, and post-deployment verification. Each step
//! appends to the workflow's review history and keeps the proposal status in
//! step with it. Transitions are validated before any side effect runs.

use chrono::Utc;
use medic_core::{
    AgentName, FixProposal, HealthStatus, ImplementationResult, MedicError, MedicResult,
    Priority, ProposalId, ProposalStatus, RemediationAction, Resolution, SemVer, StorageError,
    VerificationResult, VersionError, WorkflowAction, WorkflowError, WorkflowId, WorkflowRecord,
    WorkflowStatus,
};
use medic_health::HealthMonitor;
use medic_storage::{Stamped, StorageTrait};
use dashmap::DashMap;
use medic_versions::{CreateVersionRequest, VersionControl};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub struct ApprovalWorkflow {
    storage: Arc<dyn StorageTrait>,
    versions: Arc<VersionControl>,
    monitor: Arc<HealthMonitor>,
    /// Held for the whole of each transition, side effects included
    locks: DashMap<WorkflowId, Arc<Mutex<()>>>,
}

impl ApprovalWorkflow {
    pub fn new(
        storage: Arc<dyn StorageTrait>,
        versions: Arc<VersionControl>,
        monitor: Arc<HealthMonitor>,
    ) -> Self {
        Self {
            storage,
            versions,
            monitor,
            locks: DashMap::new(),
        }
    }

    /// Open a workflow for a deployment-ready proposal.
    pub fn submit(
        &self,
        proposal_id: ProposalId,
        actor: &str,
        notes: &str,
    ) -> MedicResult<WorkflowRecord> {
        let Stamped {
            stamp,
            value: mut proposal,
        } = self.load_proposal(proposal_id)?;

        let ready = proposal.status == ProposalStatus::Ready
            && proposal
                .test_report
                .as_ref()
                .is_some_and(|r| r.deployment_ready);
        if !ready {
            return Err(WorkflowError::NotDeploymentReady {
                proposal_id,
                reason: format!("proposal is {}", proposal.status),
            }
            .into());
        }

        proposal.transition(ProposalStatus::Submitted)?;
        let priority = Priority::from(proposal.issue.severity);
        let record = WorkflowRecord::submit(
            proposal_id,
            proposal.agent.clone(),
            proposal.issue.issue_type,
            priority,
            actor,
            notes,
        );
        self.storage.proposal_put(&proposal, Some(stamp))?;
        self.storage.workflow_put(&record, None)?;

        info!(
            workflow_id = %record.workflow_id,
            proposal_id = %proposal_id,
            agent = %record.agent,
            priority = %priority,
            "workflow submitted"
        );
        Ok(record)
    }

    pub fn start_review(&self, workflow_id: WorkflowId, reviewer: &str) -> MedicResult<WorkflowRecord> {
        self.step(
            workflow_id,
            reviewer,
            WorkflowAction::ReviewStarted {
                reviewer: reviewer.to_string(),
            },
            "",
            None,
        )
    }

    pub fn approve(
        &self,
        workflow_id: WorkflowId,
        reviewer: &str,
        notes: &str,
    ) -> MedicResult<WorkflowRecord> {
        self.step(
            workflow_id,
            reviewer,
            WorkflowAction::Approved,
            notes,
            Some(ProposalStatus::Approved),
        )
    }

    pub fn approve_with_conditions(
        &self,
        workflow_id: WorkflowId,
        reviewer: &str,
        conditions: Vec<String>,
        notes: &str,
    ) -> MedicResult<WorkflowRecord> {
        self.step(
            workflow_id,
            reviewer,
            WorkflowAction::ApprovedWithConditions { conditions },
            notes,
            Some(ProposalStatus::Approved),
        )
    }

    pub fn reject(
        &self,
        workflow_id: WorkflowId,
        reviewer: &str,
        reason: &str,
    ) -> MedicResult<WorkflowRecord> {
        self.step(
            workflow_id,
            reviewer,
            WorkflowAction::Rejected {
                reason: reason.to_string(),
            },
            "",
            Some(ProposalStatus::Rejected),
        )
    }

    /// Apply the recommended fix through the version control engine.
    ///
    /// The workflow lock is held from the transition check until the record
    /// is written, so a fix is applied at most once per workflow.
    pub fn implement(&self, workflow_id: WorkflowId, actor: &str) -> MedicResult<WorkflowRecord> {
        let lock = self.workflow_lock(workflow_id);
        let _guard = lock.lock().map_err(|_| StorageError::LockPoisoned)?;
        let record = self.get(workflow_id)?;
        self.ensure_transition(&record, WorkflowStatus::Implemented)?;

        let proposal = self.load_proposal(record.proposal_id)?.value;
        let option = proposal
            .recommended_option()
            .ok_or_else(|| WorkflowError::NotDeploymentReady {
                proposal_id: proposal.proposal_id,
                reason: "no recommended fix".to_string(),
            })?;

        let version_before = self.current_version(&record.agent)?;
        let (version_after, details) = match &option.action {
            RemediationAction::CreateVersion {
                change_type,
                description,
            } => {
                let outcome = self.versions.create_version(CreateVersionRequest::new(
                    record.agent.clone(),
                    *change_type,
                    description.clone(),
                ))?;
                let version = outcome.record.version;
                (version, format!("created {version}: {description}"))
            }
            RemediationAction::Rollback { target, force } => {
                let result = self.versions.rollback(&record.agent, *target, *force)?;
                (
                    result.to_version,
                    format!(
                        "rolled back from {} to {} ({})",
                        result.from_version, result.to_version, result.safety
                    ),
                )
            }
        };

        let result = ImplementationResult {
            action: option.action.clone(),
            version_before,
            version_after,
            details,
            implemented_at: Utc::now(),
        };
        let notes = format!("applied \"{}\"", option.title);
        self.advance(
            workflow_id,
            actor,
            WorkflowAction::Implemented { result },
            &notes,
            Some(ProposalStatus::Implemented),
        )
        .inspect_err(|e| {
            warn!(
                workflow_id = %workflow_id,
                agent = %record.agent,
                version_after = %version_after,
                error = %e,
                "fix applied but workflow not updated"
            );
        })
    }

    /// Confirm from telemetry recorded after implementation that the
    /// triggering issue no longer reproduces.
    pub fn verify(&self, workflow_id: WorkflowId, actor: &str) -> MedicResult<WorkflowRecord> {
        let lock = self.workflow_lock(workflow_id);
        let _guard = lock.lock().map_err(|_| StorageError::LockPoisoned)?;
        let record = self.get(workflow_id)?;
        let from = record.status();
        let implementation = match record.state().implementation {
            Some(implementation) if from == WorkflowStatus::Implemented => implementation,
            _ => {
                return Err(WorkflowError::InvalidTransition {
                    workflow_id,
                    from,
                    to: WorkflowStatus::Verified,
                }
                .into())
            }
        };

        let report = self
            .monitor
            .check_agent_health_since(&record.agent, implementation.implemented_at)?;
        if report.status == HealthStatus::Unknown {
            return Err(WorkflowError::VerificationEvidenceMissing { workflow_id }.into());
        }

        let reproduced = report
            .issues
            .iter()
            .any(|issue| issue.issue_type == record.issue_type);
        let issue_resolved =
            !reproduced && report.status.rank() < HealthStatus::Unhealthy.rank();

        if !issue_resolved {
            warn!(
                workflow_id = %workflow_id,
                agent = %record.agent,
                issue_type = %record.issue_type,
                status = %report.status,
                "verification failed"
            );
            return self.advance(
                workflow_id,
                actor,
                WorkflowAction::Failed {
                    reason: format!(
                        "{} still reproduces after implementation (status {})",
                        record.issue_type, report.status
                    ),
                },
                "",
                Some(ProposalStatus::Failed),
            );
        }

        let verified = self.advance(
            workflow_id,
            actor,
            WorkflowAction::Verified {
                result: VerificationResult {
                    issue_resolved,
                    health_status: report.status,
                    report_id: Some(report.report_id),
                    verified_at: Utc::now(),
                },
            },
            "",
            Some(ProposalStatus::Verified),
        )?;
        self.record_resolution(&verified, implementation.action)?;
        Ok(verified)
    }

    /// Mark an implemented or verified fix as failed.
    pub fn fail(&self, workflow_id: WorkflowId, actor: &str, reason: &str) -> MedicResult<WorkflowRecord> {
        self.step(
            workflow_id,
            actor,
            WorkflowAction::Failed {
                reason: reason.to_string(),
            },
            "",
            Some(ProposalStatus::Failed),
        )
    }

    /// Undo an implemented fix. A fix that created a version is undone by
    /// rolling the agent back to the version it replaced.
    pub fn rollback(
        &self,
        workflow_id: WorkflowId,
        actor: &str,
        force: bool,
    ) -> MedicResult<WorkflowRecord> {
        let lock = self.workflow_lock(workflow_id);
        let _guard = lock.lock().map_err(|_| StorageError::LockPoisoned)?;
        let record = self.get(workflow_id)?;
        self.ensure_transition(&record, WorkflowStatus::RolledBack)?;

        let restored_version = match record.state().implementation {
            Some(ImplementationResult {
                action: RemediationAction::CreateVersion { .. },
                version_before,
                ..
            }) => {
                self.versions.rollback(&record.agent, version_before, force)?;
                Some(version_before)
            }
            Some(_) => {
                warn!(workflow_id = %workflow_id, agent = %record.agent, "fix was a rollback; no version restored");
                None
            }
            None => None,
        };

        self.advance(
            workflow_id,
            actor,
            WorkflowAction::RolledBack { restored_version },
            "",
            Some(ProposalStatus::RolledBack),
        )
    }

    pub fn get(&self, workflow_id: WorkflowId) -> MedicResult<WorkflowRecord> {
        Ok(self.load(workflow_id)?.value)
    }

    /// Workflows awaiting review, highest priority first, then oldest first.
    pub fn pending(&self, priority: Option<Priority>) -> MedicResult<Vec<WorkflowRecord>> {
        let mut pending: Vec<WorkflowRecord> = self
            .storage
            .workflow_list()?
            .into_iter()
            .filter(|w| {
                matches!(
                    w.status(),
                    WorkflowStatus::PendingReview | WorkflowStatus::UnderReview
                )
            })
            .filter(|w| priority.map_or(true, |p| w.priority == p))
            .collect();
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(pending)
    }

    pub fn list(&self, agent: Option<&AgentName>) -> MedicResult<Vec<WorkflowRecord>> {
        Ok(self
            .storage
            .workflow_list()?
            .into_iter()
            .filter(|w| agent.map_or(true, |a| &w.agent == a))
            .collect())
    }

    fn load(&self, workflow_id: WorkflowId) -> MedicResult<Stamped<WorkflowRecord>> {
        self.storage
            .workflow_get(workflow_id)?
            .ok_or_else(|| WorkflowError::WorkflowNotFound { workflow_id }.into())
    }

    fn load_proposal(&self, proposal_id: ProposalId) -> MedicResult<Stamped<FixProposal>> {
        self.storage
            .proposal_get(proposal_id)?
            .ok_or_else(|| WorkflowError::ProposalNotFound { proposal_id }.into())
    }

    fn ensure_transition(&self, record: &WorkflowRecord, to: WorkflowStatus) -> MedicResult<()> {
        let from = record.status();
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                workflow_id: record.workflow_id,
                from,
                to,
            }
            .into())
        }
    }

    fn current_version(&self, agent: &AgentName) -> MedicResult<SemVer> {
        match self.versions.get_agent(agent) {
            Ok(known) => Ok(known.current_version),
            Err(MedicError::Version(VersionError::AgentNotFound { .. })) => Ok(SemVer::ZERO),
            Err(e) => Err(e),
        }
    }

    fn workflow_lock(&self, workflow_id: WorkflowId) -> Arc<Mutex<()>> {
        self.locks
            .entry(workflow_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// [`advance`](Self::advance) under the workflow lock.
    fn step(
        &self,
        workflow_id: WorkflowId,
        actor: &str,
        action: WorkflowAction,
        notes: &str,
        proposal_status: Option<ProposalStatus>,
    ) -> MedicResult<WorkflowRecord> {
        let lock = self.workflow_lock(workflow_id);
        let _guard = lock.lock().map_err(|_| StorageError::LockPoisoned)?;
        self.advance(workflow_id, actor, action, notes, proposal_status)
    }

    /// Append `action` to the history and move the proposal along with it.
    ///
    /// Callers hold the workflow lock.
    ///
    /// Both transitions are validated before either record is written.
    fn advance(
        &self,
        workflow_id: WorkflowId,
        actor: &str,
        action: WorkflowAction,
        notes: &str,
        proposal_status: Option<ProposalStatus>,
    ) -> MedicResult<WorkflowRecord> {
        let Stamped {
            stamp,
            value: mut record,
        } = self.load(workflow_id)?;
        let from = record.status();
        let action_name = action.name();
        let to = record.apply(actor, action, notes)?;

        let proposal = match proposal_status {
            Some(status) => {
                let Stamped {
                    stamp,
                    value: mut proposal,
                } = self.load_proposal(record.proposal_id)?;
                proposal.transition(status)?;
                Some((proposal, stamp))
            }
            None => None,
        };

        self.storage.workflow_put(&record, Some(stamp))?;
        if let Some((proposal, stamp)) = proposal {
            self.storage.proposal_put(&proposal, Some(stamp))?;
        }

        info!(
            workflow_id = %workflow_id,
            agent = %record.agent,
            actor = %actor,
            action = action_name,
            from = %from,
            to = %to,
            "workflow transition"
        );
        Ok(record)
    }

    fn record_resolution(
        &self,
        record: &WorkflowRecord,
        action: RemediationAction,
    ) -> MedicResult<()> {
        let proposal = self.load_proposal(record.proposal_id)?.value;
        let Some(option) = proposal.recommended_option() else {
            return Ok(());
        };
        self.storage.resolution_append(&Resolution {
            agent: record.agent.clone(),
            issue_type: record.issue_type,
            fix_title: option.title.clone(),
            steps: option.steps.clone(),
            action,
            workflow_id: record.workflow_id,
            resolved_at: Utc::now(),
        })?;
        info!(agent = %record.agent, issue_type = %record.issue_type, fix = %option.title, "resolution recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FixProposalEngine, StructuralTestRunner, TestingPipeline};
    use medic_core::{
        ChangeType, HealthThresholds, ImpactThresholds, Issue, IssueType, Outcome,
        RemediationConfig, Severity,
    };
    use medic_graph::DependencyTracker;
    use medic_storage::MemoryStorage;
    use std::time::Duration;

    struct Fixture {
        storage: Arc<MemoryStorage>,
        versions: Arc<VersionControl>,
        monitor: Arc<HealthMonitor>,
        proposals: FixProposalEngine,
        pipeline: TestingPipeline,
        workflow: ApprovalWorkflow,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let tracker = Arc::new(
            DependencyTracker::load(storage.clone(), ImpactThresholds::default()).unwrap(),
        );
        let versions = Arc::new(VersionControl::new(storage.clone(), tracker.clone()));
        let monitor = Arc::new(HealthMonitor::new(
            storage.clone(),
            HealthThresholds::default(),
        ));
        Fixture {
            proposals: FixProposalEngine::new(
                storage.clone(),
                versions.clone(),
                tracker,
                RemediationConfig::default(),
            ),
            pipeline: TestingPipeline::new(
                storage.clone(),
                Arc::new(StructuralTestRunner),
                Duration::from_secs(30),
            ),
            workflow: ApprovalWorkflow::new(storage.clone(), versions.clone(), monitor.clone()),
            storage,
            versions,
            monitor,
        }
    }

    impl Fixture {
        /// Agent `api` at 1.0.0 with a tested timeout proposal.
        async fn ready_proposal(&self, severity: Severity) -> FixProposal {
            self.versions
                .create_version(CreateVersionRequest::new("api", ChangeType::Major, "initial"))
                .unwrap();
            let issue = Issue::new(
                AgentName::from("api"),
                IssueType::Timeout,
                severity,
                "5 runs timed out",
            );
            let proposal = self.proposals.propose(&issue).unwrap();
            self.pipeline.run(proposal.proposal_id).await.unwrap();
            self.proposals.get_proposal(proposal.proposal_id).unwrap()
        }

        async fn implemented(&self) -> WorkflowRecord {
            let proposal = self.ready_proposal(Severity::High).await;
            let wf = self
                .workflow
                .submit(proposal.proposal_id, "monitor", "auto")
                .unwrap();
            self.workflow.start_review(wf.workflow_id, "alice").unwrap();
            self.workflow.approve(wf.workflow_id, "alice", "lgtm").unwrap();
            self.workflow.implement(wf.workflow_id, "engine").unwrap()
        }

        fn proposal_status(&self, workflow: &WorkflowRecord) -> ProposalStatus {
            self.storage
                .proposal_get(workflow.proposal_id)
                .unwrap()
                .unwrap()
                .value
                .status
        }
    }

    fn api() -> AgentName {
        AgentName::from("api")
    }

    #[tokio::test]
    async fn test_concurrent_implement_applies_fix_once() {
        let fx = fixture();
        let proposal = fx.ready_proposal(Severity::High).await;
        let wf = fx
            .workflow
            .submit(proposal.proposal_id, "monitor", "auto")
            .unwrap();
        fx.workflow.start_review(wf.workflow_id, "alice").unwrap();
        fx.workflow.approve(wf.workflow_id, "alice", "lgtm").unwrap();

        let results: Vec<MedicResult<WorkflowRecord>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| scope.spawn(|| fx.workflow.implement(wf.workflow_id, "engine")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let err = results.into_iter().find_map(Result::err).unwrap();
        assert!(matches!(
            err,
            MedicError::Workflow(WorkflowError::InvalidTransition {
                from: WorkflowStatus::Implemented,
                to: WorkflowStatus::Implemented,
                ..
            })
        ));
        // 1.0.0 plus exactly one fix version
        assert_eq!(fx.versions.get_version_history(&api()).unwrap().len(), 2);
        let record = fx.workflow.get(wf.workflow_id).unwrap();
        assert_eq!(
            record.state().implementation.unwrap().version_after,
            fx.versions.get_agent(&api()).unwrap().current_version
        );
    }

    #[tokio::test]
    async fn test_happy_path_verifies_and_records_resolution() {
        let fx = fixture();
        let wf = fx.implemented().await;
        assert_eq!(wf.status(), WorkflowStatus::Implemented);
        let implementation = wf.state().implementation.unwrap();
        assert_eq!(implementation.version_before, SemVer::new(1, 0, 0));
        assert_eq!(
            fx.versions.get_agent(&api()).unwrap().current_version,
            implementation.version_after
        );

        for _ in 0..10 {
            fx.monitor.record_outcome(&api(), Outcome::success(40.0));
        }
        let verified = fx.workflow.verify(wf.workflow_id, "engine").unwrap();
        assert_eq!(verified.status(), WorkflowStatus::Verified);
        assert!(verified.state().verification.unwrap().issue_resolved);
        assert_eq!(fx.proposal_status(&verified), ProposalStatus::Verified);

        let resolutions = fx.storage.resolution_list(&api(), IssueType::Timeout).unwrap();
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].workflow_id, wf.workflow_id);

        let actions: Vec<&str> = verified.history.iter().map(|e| e.action.name()).collect();
        assert_eq!(
            actions,
            vec!["submitted", "review_started", "approved", "implemented", "verified"]
        );
    }

    #[tokio::test]
    async fn test_reproduced_issue_fails_then_rolls_back() {
        let fx = fixture();
        let wf = fx.implemented().await;
        for _ in 0..6 {
            fx.monitor
                .report_outcome(&api(), false, 30_000.0, Some("request timed out".into()));
        }

        let failed = fx.workflow.verify(wf.workflow_id, "engine").unwrap();
        assert_eq!(failed.status(), WorkflowStatus::Failed);
        assert_eq!(fx.proposal_status(&failed), ProposalStatus::Failed);
        assert!(fx
            .storage
            .resolution_list(&api(), IssueType::Timeout)
            .unwrap()
            .is_empty());

        let rolled_back = fx.workflow.rollback(wf.workflow_id, "alice", false).unwrap();
        assert_eq!(rolled_back.status(), WorkflowStatus::RolledBack);
        assert_eq!(
            fx.versions.get_agent(&api()).unwrap().current_version,
            SemVer::new(1, 0, 0)
        );
        assert_eq!(fx.proposal_status(&rolled_back), ProposalStatus::RolledBack);
    }

    #[tokio::test]
    async fn test_verify_without_fresh_telemetry() {
        let fx = fixture();
        let wf = fx.implemented().await;
        let err = fx.workflow.verify(wf.workflow_id, "engine").unwrap_err();
        assert!(matches!(
            err,
            MedicError::Workflow(WorkflowError::VerificationEvidenceMissing { .. })
        ));
        assert_eq!(
            fx.workflow.get(wf.workflow_id).unwrap().status(),
            WorkflowStatus::Implemented
        );
    }

    #[tokio::test]
    async fn test_pending_review_cannot_jump_to_verified() {
        let fx = fixture();
        let proposal = fx.ready_proposal(Severity::High).await;
        let wf = fx.workflow.submit(proposal.proposal_id, "monitor", "").unwrap();

        let err = fx.workflow.verify(wf.workflow_id, "mallory").unwrap_err();
        assert!(matches!(
            err,
            MedicError::Workflow(WorkflowError::InvalidTransition {
                from: WorkflowStatus::PendingReview,
                to: WorkflowStatus::Verified,
                ..
            })
        ));
        let unchanged = fx.workflow.get(wf.workflow_id).unwrap();
        assert_eq!(unchanged, wf);
    }

    #[tokio::test]
    async fn test_implement_requires_approval_and_has_no_side_effects() {
        let fx = fixture();
        let proposal = fx.ready_proposal(Severity::High).await;
        let wf = fx.workflow.submit(proposal.proposal_id, "monitor", "").unwrap();
        fx.workflow.start_review(wf.workflow_id, "bob").unwrap();

        let err = fx.workflow.implement(wf.workflow_id, "engine").unwrap_err();
        assert!(matches!(
            err,
            MedicError::Workflow(WorkflowError::InvalidTransition { .. })
        ));
        assert_eq!(
            fx.versions.get_agent(&api()).unwrap().current_version,
            SemVer::new(1, 0, 0)
        );
    }

    #[tokio::test]
    async fn test_untested_proposal_cannot_be_submitted() {
        let fx = fixture();
        let issue = Issue::new(api(), IssueType::Timeout, Severity::Medium, "slow");
        let proposal = fx.proposals.propose(&issue).unwrap();
        let err = fx
            .workflow
            .submit(proposal.proposal_id, "monitor", "")
            .unwrap_err();
        assert!(matches!(
            err,
            MedicError::Workflow(WorkflowError::NotDeploymentReady { .. })
        ));
        assert!(fx.workflow.pending(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reject_is_terminal() {
        let fx = fixture();
        let proposal = fx.ready_proposal(Severity::Low).await;
        let wf = fx.workflow.submit(proposal.proposal_id, "monitor", "").unwrap();
        fx.workflow.start_review(wf.workflow_id, "carol").unwrap();
        let rejected = fx
            .workflow
            .reject(wf.workflow_id, "carol", "too risky")
            .unwrap();
        assert_eq!(rejected.status(), WorkflowStatus::Rejected);
        assert_eq!(fx.proposal_status(&rejected), ProposalStatus::Rejected);
        assert!(fx.workflow.start_review(wf.workflow_id, "dave").is_err());
    }

    #[tokio::test]
    async fn test_conditions_and_reviewer_recorded() {
        let fx = fixture();
        let proposal = fx.ready_proposal(Severity::Medium).await;
        let wf = fx.workflow.submit(proposal.proposal_id, "monitor", "").unwrap();
        fx.workflow.start_review(wf.workflow_id, "erin").unwrap();
        let approved = fx
            .workflow
            .approve_with_conditions(
                wf.workflow_id,
                "erin",
                vec!["deploy off-peak".to_string()],
                "",
            )
            .unwrap();
        let state = approved.state();
        assert_eq!(state.status, WorkflowStatus::ApprovedWithConditions);
        assert_eq!(state.reviewer.as_deref(), Some("erin"));
        assert_eq!(state.conditions, vec!["deploy off-peak".to_string()]);
        assert_eq!(fx.proposal_status(&approved), ProposalStatus::Approved);
    }

    #[tokio::test]
    async fn test_pending_sorted_and_filtered_by_priority() {
        let fx = fixture();
        fx.versions
            .create_version(CreateVersionRequest::new("api", ChangeType::Major, "initial"))
            .unwrap();
        let mut submitted = Vec::new();
        for severity in [Severity::Low, Severity::Critical, Severity::Medium] {
            let issue = Issue::new(api(), IssueType::Timeout, severity, "timeouts");
            let proposal = fx.proposals.propose(&issue).unwrap();
            fx.pipeline.run(proposal.proposal_id).await.unwrap();
            submitted.push(fx.workflow.submit(proposal.proposal_id, "monitor", "").unwrap());
        }
        fx.workflow.start_review(submitted[2].workflow_id, "frank").unwrap();

        let priorities: Vec<Priority> = fx
            .workflow
            .pending(None)
            .unwrap()
            .iter()
            .map(|w| w.priority)
            .collect();
        assert_eq!(
            priorities,
            vec![Priority::Urgent, Priority::Medium, Priority::Low]
        );
        let urgent = fx.workflow.pending(Some(Priority::Urgent)).unwrap();
        assert_eq!(urgent.len(), 1);
        assert_eq!(urgent[0].workflow_id, submitted[1].workflow_id);
    }

    #[tokio::test]
    async fn test_unknown_workflow() {
        let fx = fixture();
        let err = fx.workflow.get(WorkflowId::now_v7()).unwrap_err();
        assert!(matches!(
            err,
            MedicError::Workflow(WorkflowError::WorkflowNotFound { .. })
        ));
    }
}
