//! The MEDIC engine facade.

use medic_core::{
    Agent, AgentName, ChangeType, DependencyEdge, DependencyType, FixProposal, HealthReport,
    HealthStatus, Issue, MedicConfig, MedicResult, PipelineReport, Priority, ProposalId,
    ProposalStatus, SemVer, Timestamp, ValidationError, VersionConstraint, VersionRecord,
    WorkflowRecord,
};
use medic_graph::{Cycle, DependencyTracker, GraphProjection, ImpactReport};
use medic_health::HealthMonitor;
use medic_remediation::{
    ApprovalWorkflow, FixProposalEngine, StructuralTestRunner, TestRunner, TestingPipeline,
};
use medic_storage::{open_storage, StorageTrait};
use medic_versions::{
    CreateVersionRequest, DependencyCheckResult, RollbackResult, VersionControl, VersionOutcome,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Latest known health of one agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentHealthSummary {
    pub agent: AgentName,
    pub status: HealthStatus,
    pub current_version: Option<SemVer>,
    pub open_issues: usize,
    pub last_checked: Option<Timestamp>,
}

/// Fleet-wide health overview built from the latest stored reports.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct HealthSummary {
    /// Sorted by agent name
    pub agents: Vec<AgentHealthSummary>,
    pub healthy: usize,
    pub warning: usize,
    pub unhealthy: usize,
    pub critical: usize,
    pub unknown: usize,
}

impl HealthSummary {
    fn count(&mut self, status: HealthStatus) {
        match status {
            HealthStatus::Healthy => self.healthy += 1,
            HealthStatus::Warning => self.warning += 1,
            HealthStatus::Unhealthy => self.unhealthy += 1,
            HealthStatus::Critical => self.critical += 1,
            HealthStatus::Unknown => self.unknown += 1,
        }
    }

    pub fn needing_attention(&self) -> impl Iterator<Item = &AgentHealthSummary> {
        self.agents.iter().filter(|a| a.status.needs_attention())
    }
}

/// Result of one health check pass over every agent with telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct FleetScanSummary {
    pub checked: usize,
    pub needing_attention: Vec<AgentName>,
    pub issues: usize,
    pub errors: usize,
}

/// Single entry point wiring storage, the dependency tracker, version
/// control, health monitoring and the remediation pipeline together.
///
/// Share it behind an `Arc` to use the background helpers.
pub struct Engine {
    config: MedicConfig,
    storage: Arc<dyn StorageTrait>,
    tracker: Arc<DependencyTracker>,
    versions: Arc<VersionControl>,
    monitor: Arc<HealthMonitor>,
    proposals: FixProposalEngine,
    pipeline: TestingPipeline,
    workflow: ApprovalWorkflow,
}

impl Engine {
    /// Open the configured storage backend and build an engine over it.
    pub fn from_config(config: MedicConfig) -> MedicResult<Self> {
        let storage = open_storage(&config.storage)?;
        Self::new(config, storage)
    }

    /// Engine whose testing pipeline only runs structural validation.
    pub fn new(config: MedicConfig, storage: Arc<dyn StorageTrait>) -> MedicResult<Self> {
        Self::with_test_runner(config, storage, Arc::new(StructuralTestRunner))
    }

    pub fn with_test_runner(
        config: MedicConfig,
        storage: Arc<dyn StorageTrait>,
        runner: Arc<dyn TestRunner>,
    ) -> MedicResult<Self> {
        config.validate()?;

        let tracker = Arc::new(DependencyTracker::load(
            storage.clone(),
            config.impact.clone(),
        )?);
        let versions = Arc::new(VersionControl::new(storage.clone(), tracker.clone()));
        let monitor = Arc::new(HealthMonitor::new(storage.clone(), config.health.clone()));
        let proposals = FixProposalEngine::new(
            storage.clone(),
            versions.clone(),
            tracker.clone(),
            config.remediation.clone(),
        );
        let pipeline = TestingPipeline::new(
            storage.clone(),
            runner,
            config.remediation.stage_timeout(),
        );
        let workflow = ApprovalWorkflow::new(storage.clone(), versions.clone(), monitor.clone());

        info!(
            backend = ?config.storage.backend,
            window_size = config.health.window_size,
            stage_timeout_secs = config.remediation.stage_timeout_secs,
            "engine initialized"
        );
        Ok(Self {
            config,
            storage,
            tracker,
            versions,
            monitor,
            proposals,
            pipeline,
            workflow,
        })
    }

    pub fn config(&self) -> &MedicConfig {
        &self.config
    }

    pub fn versions(&self) -> &VersionControl {
        &self.versions
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    pub fn tracker(&self) -> &DependencyTracker {
        &self.tracker
    }

    pub fn proposals(&self) -> &FixProposalEngine {
        &self.proposals
    }

    pub fn workflow(&self) -> &ApprovalWorkflow {
        &self.workflow
    }

    // ========================================================================
    // INBOUND
    // ========================================================================

    /// Record one execution outcome in the agent's telemetry window.
    pub fn report_outcome(
        &self,
        agent: &AgentName,
        success: bool,
        latency_ms: f64,
        error: Option<String>,
    ) -> MedicResult<()> {
        if agent.as_str().trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "agent".to_string(),
            }
            .into());
        }
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "latency_ms".to_string(),
                reason: format!("{latency_ms} is not a non-negative duration"),
            }
            .into());
        }
        self.monitor
            .report_outcome(agent, success, latency_ms, error);
        Ok(())
    }

    pub fn request_version_update(
        &self,
        agent: &AgentName,
        change_type: ChangeType,
        description: &str,
        breaking_changes: Vec<String>,
    ) -> MedicResult<VersionOutcome> {
        self.versions.create_version(
            CreateVersionRequest::new(agent.clone(), change_type, description)
                .with_breaking_changes(breaking_changes),
        )
    }

    /// Version update carrying a new code snapshot for breaking change
    /// detection.
    pub fn request_version_update_with_code(
        &self,
        request: CreateVersionRequest,
    ) -> MedicResult<VersionOutcome> {
        self.versions.create_version(request)
    }

    pub fn request_rollback(
        &self,
        agent: &AgentName,
        target: SemVer,
        force: bool,
    ) -> MedicResult<RollbackResult> {
        self.versions.rollback(agent, target, force)
    }

    /// Add a dependency edge. `constraint` accepts `x.y.z`, `>=x.y.z`,
    /// `^x.y.z` or `*`. Returns the cycles present after the change.
    pub fn add_dependency(
        &self,
        dependent: &AgentName,
        dependency: &AgentName,
        constraint: &str,
        dependency_type: DependencyType,
    ) -> MedicResult<Vec<Cycle>> {
        let constraint = VersionConstraint::parse(constraint)?;
        self.tracker.add_dependency(DependencyEdge::new(
            dependent.clone(),
            dependency.clone(),
            constraint,
            dependency_type,
        ))
    }

    pub fn remove_dependency(
        &self,
        dependent: &AgentName,
        dependency: &AgentName,
    ) -> MedicResult<()> {
        self.tracker.remove_dependency(dependent, dependency)
    }

    // ========================================================================
    // OUTBOUND
    // ========================================================================

    /// Latest health of every agent known to storage or with telemetry.
    pub fn get_health_summary(&self) -> MedicResult<HealthSummary> {
        let agents = self.storage.agent_list()?;
        let mut names: Vec<AgentName> = agents.iter().map(|a| a.name.clone()).collect();
        for tracked in self.monitor.tracked_agents() {
            if !names.contains(&tracked) {
                names.push(tracked);
            }
        }
        names.sort();

        let mut summary = HealthSummary::default();
        for name in names {
            let latest = self.monitor.latest_report(&name)?;
            let status = latest.as_ref().map_or(HealthStatus::Unknown, |r| r.status);
            summary.count(status);
            summary.agents.push(AgentHealthSummary {
                current_version: agents
                    .iter()
                    .find(|a| a.name == name)
                    .map(|a| a.current_version),
                open_issues: latest.as_ref().map_or(0, |r| r.issues.len()),
                last_checked: latest.map(|r| r.checked_at),
                agent: name,
                status,
            });
        }
        Ok(summary)
    }

    pub fn get_dependency_graph(&self) -> MedicResult<GraphProjection> {
        self.tracker.projection()
    }

    pub fn get_open_issues(&self, agent: Option<&AgentName>) -> MedicResult<Vec<Issue>> {
        self.monitor.open_issues(agent)
    }

    pub fn get_pending_workflows(
        &self,
        priority: Option<Priority>,
    ) -> MedicResult<Vec<WorkflowRecord>> {
        self.workflow.pending(priority)
    }

    pub fn check_agent_health(&self, agent: &AgentName) -> MedicResult<HealthReport> {
        self.monitor.check_agent_health(agent)
    }

    pub fn get_health_history(&self, agent: &AgentName) -> MedicResult<Vec<HealthReport>> {
        self.monitor.get_health_history(agent)
    }

    pub fn analyze_update_impact(
        &self,
        agent: &AgentName,
        new_version: SemVer,
    ) -> MedicResult<ImpactReport> {
        self.tracker.analyze_update_impact(agent, new_version)
    }

    pub fn check_dependencies(&self, agent: &AgentName) -> MedicResult<DependencyCheckResult> {
        self.versions.check_dependencies_satisfied(agent)
    }

    pub fn get_agent(&self, agent: &AgentName) -> MedicResult<Agent> {
        self.versions.get_agent(agent)
    }

    pub fn list_agents(&self) -> MedicResult<Vec<Agent>> {
        self.versions.list_agents()
    }

    pub fn get_version_history(&self, agent: &AgentName) -> MedicResult<Vec<VersionRecord>> {
        self.versions.get_version_history(agent)
    }

    pub fn get_version(&self, agent: &AgentName, version: SemVer) -> MedicResult<VersionRecord> {
        self.versions.get_version(agent, version)
    }

    // ========================================================================
    // REMEDIATION
    // ========================================================================

    /// Create proposals for the agent's open issues that have no proposal in
    /// flight yet.
    pub fn propose_fixes(&self, agent: &AgentName) -> MedicResult<Vec<FixProposal>> {
        let in_flight: Vec<_> = self
            .proposals
            .list_proposals(Some(agent))?
            .into_iter()
            .filter(|p| is_in_flight(p.status))
            .map(|p| p.issue.issue_type)
            .collect();

        let mut created = Vec::new();
        for issue in self.monitor.open_issues(Some(agent))? {
            if in_flight.contains(&issue.issue_type)
                || created
                    .iter()
                    .any(|p: &FixProposal| p.issue.issue_type == issue.issue_type)
            {
                debug!(agent = %agent, issue_type = %issue.issue_type, "proposal already in flight");
                continue;
            }
            created.push(self.proposals.propose(&issue)?);
        }
        Ok(created)
    }

    pub async fn run_pipeline(&self, proposal_id: ProposalId) -> MedicResult<PipelineReport> {
        self.pipeline.run(proposal_id).await
    }

    // ========================================================================
    // BACKGROUND WORK
    // ========================================================================

    /// Check the health of every agent with telemetry and store the reports.
    pub fn scan_fleet(&self) -> MedicResult<FleetScanSummary> {
        let mut summary = FleetScanSummary::default();
        for agent in self.monitor.tracked_agents() {
            match self.monitor.check_agent_health(&agent) {
                Ok(report) => {
                    summary.checked += 1;
                    summary.issues += report.issues.len();
                    if report.status.needs_attention() {
                        summary.needing_attention.push(agent);
                    }
                }
                Err(e) => {
                    warn!(agent = %agent, error = %e, "health check failed");
                    summary.errors += 1;
                }
            }
        }
        debug!(
            checked = summary.checked,
            needing_attention = summary.needing_attention.len(),
            errors = summary.errors,
            "fleet scan finished"
        );
        Ok(summary)
    }

    /// Run [`Self::scan_fleet`] on the blocking thread pool.
    pub fn spawn_fleet_scan(self: &Arc<Self>) -> JoinHandle<MedicResult<FleetScanSummary>> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.scan_fleet())
    }

    /// Run a proposal's test pipeline on a worker task.
    pub fn run_pipeline_in_background(
        self: &Arc<Self>,
        proposal_id: ProposalId,
    ) -> JoinHandle<MedicResult<PipelineReport>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.pipeline.run(proposal_id).await })
    }
}

fn is_in_flight(status: ProposalStatus) -> bool {
    matches!(
        status,
        ProposalStatus::Draft
            | ProposalStatus::Testing
            | ProposalStatus::Ready
            | ProposalStatus::Submitted
            | ProposalStatus::Approved
            | ProposalStatus::Implemented
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use medic_core::{IssueType, MedicError, StorageBackend, VersionError};
    use medic_storage::MemoryStorage;

    fn engine() -> Engine {
        Engine::new(MedicConfig::default(), Arc::new(MemoryStorage::new())).unwrap()
    }

    fn name(s: &str) -> AgentName {
        AgentName::from(s)
    }

    #[test]
    fn test_report_outcome_validates_input() {
        let engine = engine();
        assert!(engine.report_outcome(&name(""), true, 10.0, None).is_err());
        assert!(engine
            .report_outcome(&name("api"), true, f64::NAN, None)
            .is_err());
        assert!(engine.report_outcome(&name("api"), true, -1.0, None).is_err());
        engine.report_outcome(&name("api"), true, 10.0, None).unwrap();
        assert_eq!(engine.monitor().window(&name("api")).len(), 1);
    }

    #[test]
    fn test_health_summary_counts_statuses() {
        let engine = engine();
        engine
            .request_version_update(&name("idle"), ChangeType::Minor, "initial", vec![])
            .unwrap();
        for _ in 0..20 {
            engine.report_outcome(&name("api"), true, 100.0, None).unwrap();
        }
        for i in 0..10 {
            engine
                .report_outcome(&name("flaky"), i % 2 == 0, 8000.0, Some("boom".into()))
                .unwrap();
        }
        engine.scan_fleet().unwrap();

        let summary = engine.get_health_summary().unwrap();
        let names: Vec<&str> = summary.agents.iter().map(|a| a.agent.as_str()).collect();
        assert_eq!(names, vec!["api", "flaky", "idle"]);
        assert_eq!(summary.healthy, 1);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.unknown, 1);
        assert_eq!(summary.agents[2].current_version, Some(SemVer::new(0, 1, 0)));
        let attention: Vec<&AgentName> =
            summary.needing_attention().map(|a| &a.agent).collect();
        assert_eq!(attention, vec![&name("flaky")]);
    }

    #[test]
    fn test_dependency_graph_reports_cycles() {
        let engine = engine();
        engine
            .add_dependency(&name("a"), &name("b"), "^1.0.0", DependencyType::Requires)
            .unwrap();
        engine
            .add_dependency(&name("b"), &name("c"), "*", DependencyType::Requires)
            .unwrap();
        let cycles = engine
            .add_dependency(&name("c"), &name("a"), ">=0.1.0", DependencyType::Requires)
            .unwrap();
        assert_eq!(cycles.len(), 1);

        let graph = engine.get_dependency_graph().unwrap();
        assert_eq!(graph.edges.len(), 3);
        assert_eq!(graph.cycles.len(), 1);

        engine.remove_dependency(&name("c"), &name("a")).unwrap();
        assert!(engine.get_dependency_graph().unwrap().cycles.is_empty());
    }

    #[test]
    fn test_invalid_constraint_fails_fast() {
        let engine = engine();
        let err = engine
            .add_dependency(&name("a"), &name("b"), "~1.2", DependencyType::Requires)
            .unwrap_err();
        assert!(matches!(
            err,
            MedicError::Validation(ValidationError::InvalidConstraint { .. })
        ));
        assert!(engine.get_dependency_graph().unwrap().edges.is_empty());
    }

    #[test]
    fn test_rollback_passthrough() {
        let engine = engine();
        let api = name("api");
        engine
            .request_version_update(&api, ChangeType::Major, "initial", vec![])
            .unwrap();
        engine
            .request_version_update(
                &api,
                ChangeType::Major,
                "drop v1 endpoints",
                vec!["removed /v1".to_string()],
            )
            .unwrap();

        let err = engine
            .request_rollback(&api, SemVer::new(1, 0, 0), false)
            .unwrap_err();
        assert!(matches!(
            err,
            MedicError::Version(VersionError::UnsafeRollback { .. })
        ));
        let result = engine
            .request_rollback(&api, SemVer::new(1, 0, 0), true)
            .unwrap();
        assert!(result.forced);
        assert_eq!(
            engine.get_agent(&api).unwrap().current_version,
            SemVer::new(1, 0, 0)
        );
    }

    #[test]
    fn test_propose_fixes_skips_in_flight_issues() {
        let engine = engine();
        let api = name("api");
        for _ in 0..10 {
            engine
                .report_outcome(&api, false, 50.0, Some("connection refused".into()))
                .unwrap();
        }
        engine.check_agent_health(&api).unwrap();
        let open = engine.get_open_issues(Some(&api)).unwrap();
        assert!(open.iter().any(|i| i.issue_type == IssueType::HighErrorRate));

        let first = engine.propose_fixes(&api).unwrap();
        assert_eq!(first.len(), open.len());
        assert!(engine.propose_fixes(&api).unwrap().is_empty());
    }

    #[test]
    fn test_lmdb_backend_requires_path() {
        let mut config = MedicConfig::default();
        config.storage.backend = StorageBackend::Lmdb;
        assert!(Engine::from_config(config).is_err());
    }

    #[test]
    fn test_engine_over_lmdb() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MedicConfig::default();
        config.storage.backend = StorageBackend::Lmdb;
        config.storage.path = Some(dir.path().to_path_buf());
        config.storage.map_size_mb = 16;
        let engine = Engine::from_config(config).unwrap();

        engine
            .request_version_update(&name("api"), ChangeType::Patch, "one", vec![])
            .unwrap();
        engine
            .add_dependency(&name("web"), &name("api"), "0.0.1", DependencyType::Requires)
            .unwrap();
        assert!(engine.check_dependencies(&name("web")).unwrap().satisfied);
        assert_eq!(engine.get_version_history(&name("api")).unwrap().len(), 1);
        assert!(matches!(
            engine.get_version(&name("api"), SemVer::new(9, 9, 9)),
            Err(MedicError::Version(VersionError::VersionNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_background_scan_and_pipeline() {
        let engine = Arc::new(engine());
        let api = name("api");
        for _ in 0..5 {
            engine
                .report_outcome(&api, false, 50.0, Some("request timed out".into()))
                .unwrap();
        }
        let summary = engine.spawn_fleet_scan().await.unwrap().unwrap();
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.needing_attention, vec![api.clone()]);

        let proposals = engine.propose_fixes(&api).unwrap();
        let report = engine
            .run_pipeline_in_background(proposals[0].proposal_id)
            .await
            .unwrap()
            .unwrap();
        assert!(report.deployment_ready);
        assert_eq!(
            engine
                .proposals()
                .get_proposal(proposals[0].proposal_id)
                .unwrap()
                .status,
            ProposalStatus::Ready
        );
    }
}
