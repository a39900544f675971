//! Version Control Engine.

use crate::migration::migration_script_stub;
use crate::safety::assess_rollback_safety;
use chrono::Utc;
use dashmap::DashMap;
use medic_core::{
    content_hash_hex, Agent, AgentName, BackupSnapshot, ChangeType, ContentHash, DependencyType,
    MedicResult, RollbackEvent, RollbackSafety, SemVer, StorageError, SurfaceError,
    ValidationError, VersionConstraint, VersionError, VersionRecord,
};
use medic_graph::{DependencyTracker, ImpactReport};
use medic_storage::{Stamped, StorageTrait};
use medic_surface::{BreakingChangeDetector, BreakingChangeReport};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

// ============================================================================
// REQUEST / RESULT TYPES
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateVersionRequest {
    pub agent: AgentName,
    pub change_type: ChangeType,
    pub description: String,
    /// Caller-declared breaking changes
    pub breaking_changes: Vec<String>,
    /// Full new code of the agent, if it changed
    pub code: Option<String>,
}

impl CreateVersionRequest {
    pub fn new(
        agent: impl Into<AgentName>,
        change_type: ChangeType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            agent: agent.into(),
            change_type,
            description: description.into(),
            breaking_changes: Vec::new(),
            code: None,
        }
    }

    pub fn with_breaking_changes(mut self, changes: Vec<String>) -> Self {
        self.breaking_changes = changes;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionOutcome {
    pub record: VersionRecord,
    /// Code snapshots that could not be analyzed
    pub warnings: Vec<String>,
    pub detected: Option<BreakingChangeReport>,
    /// Dependents that need redeploying, in deployment order
    pub impact: ImpactReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackResult {
    pub agent: AgentName,
    pub from_version: SemVer,
    pub to_version: SemVer,
    pub safety: RollbackSafety,
    pub forced: bool,
    /// Versions whose records were reverted, newest first
    pub reverted: Vec<SemVer>,
    pub restored_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeCheck {
    pub dependency: AgentName,
    pub dependency_type: DependencyType,
    pub constraint: VersionConstraint,
    /// `0.0.0` for a dependency that has no versions yet
    pub current_version: SemVer,
    pub registered: bool,
    pub satisfied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyCheckResult {
    pub agent: AgentName,
    pub satisfied: bool,
    pub edges: Vec<EdgeCheck>,
}

impl DependencyCheckResult {
    pub fn unsatisfied(&self) -> impl Iterator<Item = &EdgeCheck> {
        self.edges.iter().filter(|e| !e.satisfied)
    }
}

// ============================================================================
// VERSION CONTROL
// ============================================================================

pub struct VersionControl {
    storage: Arc<dyn StorageTrait>,
    tracker: Arc<DependencyTracker>,
    detector: BreakingChangeDetector,
    /// Per-agent write locks
    locks: DashMap<AgentName, Arc<Mutex<()>>>,
}

impl VersionControl {
    pub fn new(storage: Arc<dyn StorageTrait>, tracker: Arc<DependencyTracker>) -> Self {
        Self {
            storage,
            tracker,
            detector: BreakingChangeDetector::default(),
            locks: DashMap::new(),
        }
    }

    pub fn with_detector(mut self, detector: BreakingChangeDetector) -> Self {
        self.detector = detector;
        self
    }

    fn agent_lock(&self, agent: &AgentName) -> Arc<Mutex<()>> {
        self.locks
            .entry(agent.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn load(&self, agent: &AgentName) -> MedicResult<Stamped<Agent>> {
        self.storage.agent_get(agent)?.ok_or_else(|| {
            VersionError::AgentNotFound {
                agent: agent.clone(),
            }
            .into()
        })
    }

    /// Code currently deployed for `agent`.
    fn code_at(&self, agent: &Agent) -> MedicResult<String> {
        match self.storage.backup_get(&agent.current_hash)? {
            Some(snapshot) => Ok(snapshot.content),
            None if agent.history.is_empty() => Ok(String::new()),
            None => Err(backup_unavailable(agent, agent.current_version, &agent.current_hash)),
        }
    }

    /// Record a new version. Unknown agents start at `0.0.0`.
    ///
    /// The current code is backed up before the pointer advances. When new
    /// code is supplied, critical and high surface changes are merged into the
    /// record's breaking changes; unparseable code only produces warnings.
    pub fn create_version(&self, request: CreateVersionRequest) -> MedicResult<VersionOutcome> {
        let CreateVersionRequest {
            agent: name,
            change_type,
            description,
            breaking_changes,
            code,
        } = request;
        if name.as_str().trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "agent".to_string(),
            }
            .into());
        }

        let lock = self.agent_lock(&name);
        let guard = lock.lock().map_err(|_| StorageError::LockPoisoned)?;

        let (mut agent, stamp) = match self.storage.agent_get(&name)? {
            Some(stamped) => (stamped.value, Some(stamped.stamp)),
            None => (Agent::new(name.clone()), None),
        };
        let from = agent.current_version;
        let to = agent.next_version(change_type)?;

        let current_code = self.code_at(&agent)?;
        let backup = BackupSnapshot::new(name.clone(), from, current_code.as_str());
        self.storage.backup_put(&backup)?;

        let mut breaking = breaking_changes;
        let mut warnings = Vec::new();
        let mut detected = None;
        let content_hash = match code {
            Some(code) => {
                let report = self.detector.compare(&name, from, to, &current_code, &code);
                for change in report.breaking_changes() {
                    let descriptor = format!("{}: {}", change.kind, change.description);
                    if !breaking.contains(&descriptor) {
                        breaking.push(descriptor);
                    }
                }
                warnings.extend(report.warnings.iter().map(SurfaceError::to_string));
                detected = Some(report);

                let snapshot = BackupSnapshot::new(name.clone(), to, code);
                self.storage.backup_put(&snapshot)?;
                snapshot.hash
            }
            None => agent.current_hash,
        };

        let migration_required = !breaking.is_empty();
        let migration_script =
            migration_required.then(|| migration_script_stub(&name, from, to, &breaking));
        let now = Utc::now();
        let record = VersionRecord {
            version: to,
            previous_version: from,
            change_type,
            description,
            breaking_changes: breaking,
            content_hash,
            backup_hash: backup.hash,
            migration_required,
            migration_script,
            created_at: now,
        };

        agent.history.push(record.clone());
        agent.current_version = to;
        agent.current_hash = content_hash;
        agent.updated_at = now;
        self.storage.agent_put(&agent, stamp)?;
        drop(guard);

        info!(
            agent = %name,
            from = %from,
            to = %to,
            change_type = %change_type,
            migration_required,
            "version created"
        );
        for warning in &warnings {
            warn!(agent = %name, version = %to, warning = %warning, "version created without surface analysis");
        }

        self.tracker.ensure_agent(&name)?;
        let impact = self.tracker.analyze_update_impact(&name, to)?;

        Ok(VersionOutcome {
            record,
            warnings,
            detected,
            impact,
        })
    }

    /// Safety of rolling `agent` back to `target`, without changing anything.
    pub fn assess_rollback(&self, agent: &AgentName, target: SemVer) -> MedicResult<RollbackSafety> {
        let Stamped { value: agent, .. } = self.load(agent)?;
        validate_target(&agent, target)?;
        Ok(assess_rollback_safety(agent.records_reverted_by(target)))
    }

    /// Move the current pointer back to `target` and restore its backup.
    ///
    /// History is retained. A DANGEROUS range requires `force`.
    pub fn rollback(&self, name: &AgentName, target: SemVer, force: bool) -> MedicResult<RollbackResult> {
        let lock = self.agent_lock(name);
        let _guard = lock.lock().map_err(|_| StorageError::LockPoisoned)?;

        let Stamped {
            stamp,
            value: mut agent,
        } = self.load(name)?;
        validate_target(&agent, target)?;

        let from = agent.current_version;
        let reverted: Vec<&VersionRecord> = agent.records_reverted_by(target);
        let safety = assess_rollback_safety(reverted.iter().copied());
        let reverted: Vec<SemVer> = reverted.iter().map(|r| r.version).collect();

        if safety == RollbackSafety::Dangerous && !force {
            debug!(agent = %name, from = %from, to = %target, "unforced rollback refused");
            return Err(VersionError::UnsafeRollback {
                agent: name.clone(),
                target,
                safety,
            }
            .into());
        }

        let hash = agent
            .state_hash_at(target)
            .ok_or_else(|| VersionError::VersionNotFound {
                agent: name.clone(),
                version: target,
            })?;
        let snapshot = self
            .storage
            .backup_get(&hash)?
            .ok_or_else(|| backup_unavailable(&agent, target, &hash))?;

        let now = Utc::now();
        agent.current_version = target;
        agent.current_hash = snapshot.hash;
        agent.updated_at = now;
        agent.rollbacks.push(RollbackEvent {
            from_version: from,
            to_version: target,
            safety,
            forced: force,
            rolled_back_at: now,
        });
        self.storage.agent_put(&agent, Some(stamp))?;

        if safety == RollbackSafety::Dangerous {
            warn!(agent = %name, from = %from, to = %target, safety = %safety, "forced rollback across breaking changes");
        } else {
            info!(agent = %name, from = %from, to = %target, safety = %safety, "rollback completed");
        }

        Ok(RollbackResult {
            agent: name.clone(),
            from_version: from,
            to_version: target,
            safety,
            forced: force,
            reverted,
            restored_hash: content_hash_hex(&snapshot.hash),
        })
    }

    /// Compare each `requires`/`recommends` dependency's current version
    /// against the edge constraint.
    pub fn check_dependencies_satisfied(&self, agent: &AgentName) -> MedicResult<DependencyCheckResult> {
        let snapshot = self.tracker.snapshot()?;
        if !snapshot.contains(agent) && self.storage.agent_get(agent)?.is_none() {
            return Err(VersionError::AgentNotFound {
                agent: agent.clone(),
            }
            .into());
        }

        let mut edges = Vec::new();
        for edge in snapshot.dependencies_of(agent) {
            if !edge.dependency_type.is_version_checked() {
                continue;
            }
            let current = self
                .storage
                .agent_get(&edge.dependency)?
                .map(|stamped| stamped.value.current_version);
            let current_version = current.unwrap_or(SemVer::ZERO);
            edges.push(EdgeCheck {
                dependency: edge.dependency.clone(),
                dependency_type: edge.dependency_type,
                constraint: edge.constraint,
                current_version,
                registered: current.is_some(),
                satisfied: edge.constraint.is_satisfied_by(&current_version),
            });
        }
        let satisfied = edges.iter().all(|e| e.satisfied);
        debug!(agent = %agent, checked = edges.len(), satisfied, "dependency check");
        Ok(DependencyCheckResult {
            agent: agent.clone(),
            satisfied,
            edges,
        })
    }

    // === Queries ===

    pub fn get_agent(&self, agent: &AgentName) -> MedicResult<Agent> {
        Ok(self.load(agent)?.value)
    }

    pub fn list_agents(&self) -> MedicResult<Vec<Agent>> {
        self.storage.agent_list()
    }

    /// Version records in creation order.
    pub fn get_version_history(&self, agent: &AgentName) -> MedicResult<Vec<VersionRecord>> {
        Ok(self.load(agent)?.value.history)
    }

    pub fn get_version(&self, agent: &AgentName, version: SemVer) -> MedicResult<VersionRecord> {
        self.load(agent)?
            .value
            .record(version)
            .cloned()
            .ok_or_else(|| {
                VersionError::VersionNotFound {
                    agent: agent.clone(),
                    version,
                }
                .into()
            })
    }

    /// Code deployed at the agent's current version.
    pub fn current_code(&self, agent: &AgentName) -> MedicResult<String> {
        self.code_at(&self.load(agent)?.value)
    }
}

fn validate_target(agent: &Agent, target: SemVer) -> MedicResult<()> {
    if !agent.has_version(target) {
        return Err(VersionError::VersionNotFound {
            agent: agent.name.clone(),
            version: target,
        }
        .into());
    }
    if target >= agent.current_version {
        return Err(VersionError::InvalidRollbackTarget {
            agent: agent.name.clone(),
            current: agent.current_version,
            target,
        }
        .into());
    }
    Ok(())
}

fn backup_unavailable(agent: &Agent, version: SemVer, hash: &ContentHash) -> medic_core::MedicError {
    VersionError::BackupUnavailable {
        agent: agent.name.clone(),
        version,
        hash: content_hash_hex(hash),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use medic_core::{DependencyEdge, ImpactThresholds, MedicError};
    use medic_storage::MemoryStorage;

    fn engine() -> (VersionControl, Arc<MemoryStorage>, Arc<DependencyTracker>) {
        let storage = Arc::new(MemoryStorage::new());
        let tracker = Arc::new(
            DependencyTracker::load(storage.clone(), ImpactThresholds::default()).unwrap(),
        );
        (
            VersionControl::new(storage.clone(), tracker.clone()),
            storage,
            tracker,
        )
    }

    fn patch(agent: &str) -> CreateVersionRequest {
        CreateVersionRequest::new(agent, ChangeType::Patch, "fix")
    }

    #[test]
    fn test_three_patches_from_nothing() {
        let (vc, _, _) = engine();
        let versions: Vec<SemVer> = (0..3)
            .map(|_| vc.create_version(patch("extractor")).unwrap().record.version)
            .collect();
        assert_eq!(
            versions,
            vec![
                SemVer::new(0, 0, 1),
                SemVer::new(0, 0, 2),
                SemVer::new(0, 0, 3)
            ]
        );
        let history = vc.get_version_history(&AgentName::from("extractor")).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].previous_version, SemVer::new(0, 0, 1));
    }

    #[test]
    fn test_major_and_minor_reset_lower_components() {
        let (vc, _, _) = engine();
        vc.create_version(patch("a")).unwrap();
        let minor = vc
            .create_version(CreateVersionRequest::new("a", ChangeType::Minor, "feature"))
            .unwrap();
        assert_eq!(minor.record.version, SemVer::new(0, 1, 0));
        let major = vc
            .create_version(CreateVersionRequest::new("a", ChangeType::Major, "rewrite"))
            .unwrap();
        assert_eq!(major.record.version, SemVer::new(1, 0, 0));
    }

    #[test]
    fn test_breaking_changes_attach_migration_stub() {
        let (vc, _, _) = engine();
        let outcome = vc
            .create_version(
                patch("a").with_breaking_changes(vec!["dropped legacy mode".to_string()]),
            )
            .unwrap();
        assert!(outcome.record.migration_required);
        let script = outcome.record.migration_script.unwrap();
        assert!(script.contains("dropped legacy mode"));
    }

    #[test]
    fn test_unforced_dangerous_rollback_fails_and_pointer_stays() {
        let (vc, _, _) = engine();
        let name = AgentName::from("renderer");
        vc.create_version(patch("renderer")).unwrap();
        vc.create_version(
            CreateVersionRequest::new("renderer", ChangeType::Minor, "new api")
                .with_breaking_changes(vec!["removed render_v1()".to_string()]),
        )
        .unwrap();

        let err = vc.rollback(&name, SemVer::new(0, 0, 1), false).unwrap_err();
        assert!(matches!(
            err,
            MedicError::Version(VersionError::UnsafeRollback {
                safety: RollbackSafety::Dangerous,
                ..
            })
        ));
        assert_eq!(
            vc.get_agent(&name).unwrap().current_version,
            SemVer::new(0, 1, 0)
        );

        let result = vc.rollback(&name, SemVer::new(0, 0, 1), true).unwrap();
        assert_eq!(result.safety, RollbackSafety::Dangerous);
        assert!(result.forced);
        assert_eq!(result.reverted, vec![SemVer::new(0, 1, 0)]);

        let agent = vc.get_agent(&name).unwrap();
        assert_eq!(agent.current_version, SemVer::new(0, 0, 1));
        assert_eq!(agent.history.len(), 2);
        assert_eq!(agent.rollbacks.len(), 1);
    }

    #[test]
    fn test_rollback_restores_code_and_numbering_stays_monotonic() {
        let (vc, _, _) = engine();
        let name = AgentName::from("scraper");
        vc.create_version(patch("scraper").with_code("def run(page):\n    pass\n"))
            .unwrap();
        vc.create_version(patch("scraper").with_code("def run(page, depth=1):\n    pass\n"))
            .unwrap();

        let result = vc.rollback(&name, SemVer::new(0, 0, 1), false).unwrap();
        assert_eq!(result.safety, RollbackSafety::Safe);
        assert_eq!(vc.current_code(&name).unwrap(), "def run(page):\n    pass\n");

        let next = vc.create_version(patch("scraper")).unwrap();
        assert_eq!(next.record.version, SemVer::new(0, 0, 3));
        assert_eq!(next.record.previous_version, SemVer::new(0, 0, 1));
    }

    #[test]
    fn test_rollback_range_includes_records_off_the_current_lineage() {
        let (vc, _, _) = engine();
        let name = AgentName::from("indexer");
        vc.create_version(patch("indexer")).unwrap();
        vc.create_version(
            patch("indexer").with_breaking_changes(vec!["removed index_all()".to_string()]),
        )
        .unwrap();
        vc.create_version(patch("indexer")).unwrap();
        vc.rollback(&name, SemVer::new(0, 0, 1), true).unwrap();
        let latest = vc.create_version(patch("indexer")).unwrap();
        assert_eq!(latest.record.version, SemVer::new(0, 0, 4));
        assert_eq!(latest.record.previous_version, SemVer::new(0, 0, 1));

        // 0.0.2 is no longer an ancestor of 0.0.4 but still lies in (0.0.1, 0.0.4]
        assert_eq!(
            vc.assess_rollback(&name, SemVer::new(0, 0, 1)).unwrap(),
            RollbackSafety::Dangerous
        );
        let err = vc.rollback(&name, SemVer::new(0, 0, 1), false).unwrap_err();
        assert!(matches!(
            err,
            MedicError::Version(VersionError::UnsafeRollback {
                safety: RollbackSafety::Dangerous,
                ..
            })
        ));
        assert_eq!(
            vc.get_agent(&name).unwrap().current_version,
            SemVer::new(0, 0, 4)
        );

        let forced = vc.rollback(&name, SemVer::new(0, 0, 1), true).unwrap();
        assert_eq!(
            forced.reverted,
            vec![SemVer::new(0, 0, 4), SemVer::new(0, 0, 3), SemVer::new(0, 0, 2)]
        );
    }

    #[test]
    fn test_rollback_to_zero_restores_empty_code() {
        let (vc, _, _) = engine();
        let name = AgentName::from("fresh");
        vc.create_version(patch("fresh").with_code("def go():\n    pass\n"))
            .unwrap();
        vc.rollback(&name, SemVer::ZERO, false).unwrap();
        assert_eq!(vc.current_code(&name).unwrap(), "");
    }

    #[test]
    fn test_rollback_target_validation() {
        let (vc, _, _) = engine();
        let name = AgentName::from("a");
        assert!(matches!(
            vc.rollback(&name, SemVer::ZERO, false).unwrap_err(),
            MedicError::Version(VersionError::AgentNotFound { .. })
        ));
        vc.create_version(patch("a")).unwrap();
        assert!(matches!(
            vc.rollback(&name, SemVer::new(0, 0, 7), false).unwrap_err(),
            MedicError::Version(VersionError::VersionNotFound { .. })
        ));
        assert!(matches!(
            vc.rollback(&name, SemVer::new(0, 0, 1), false).unwrap_err(),
            MedicError::Version(VersionError::InvalidRollbackTarget { .. })
        ));
    }

    #[test]
    fn test_missing_backup_is_reported() {
        let (vc, storage, _) = engine();
        let name = AgentName::from("a");
        vc.create_version(patch("a")).unwrap();
        vc.create_version(patch("a")).unwrap();

        // Point the first record at a backup that was never stored.
        let mut stamped = storage.agent_get(&name).unwrap().unwrap();
        stamped.value.history[0].content_hash = medic_core::compute_content_hash(b"lost");
        storage.agent_put(&stamped.value, Some(stamped.stamp)).unwrap();

        let err = vc.rollback(&name, SemVer::new(0, 0, 1), false).unwrap_err();
        assert!(matches!(
            err,
            MedicError::Version(VersionError::BackupUnavailable { .. })
        ));
    }

    #[test]
    fn test_code_snapshot_detects_breaking_changes() {
        let (vc, _, _) = engine();
        vc.create_version(patch("parser").with_code("def foo(a):\n    pass\n"))
            .unwrap();
        let outcome = vc
            .create_version(patch("parser").with_code("def foo(a, b):\n    pass\n"))
            .unwrap();
        assert!(outcome.record.migration_required);
        assert_eq!(outcome.record.breaking_changes.len(), 1);
        assert!(outcome.record.breaking_changes[0].starts_with("signature_changed"));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_unparseable_code_is_a_warning() {
        let (vc, _, _) = engine();
        let outcome = vc
            .create_version(patch("parser").with_code("def foo(a:\n"))
            .unwrap();
        assert!(!outcome.record.migration_required);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.record.version, SemVer::new(0, 0, 1));
    }

    #[test]
    fn test_create_reports_impact_on_dependents() {
        let (vc, _, tracker) = engine();
        tracker
            .add_dependency(DependencyEdge::requires("web", "api"))
            .unwrap();
        let outcome = vc.create_version(patch("api")).unwrap();
        assert_eq!(outcome.impact.direct_dependents, vec![AgentName::from("web")]);
        assert_eq!(
            outcome.impact.deployment_order,
            vec![AgentName::from("api"), AgentName::from("web")]
        );
    }

    #[test]
    fn test_dependency_satisfaction() {
        let (vc, _, tracker) = engine();
        tracker
            .add_dependency(DependencyEdge::new(
                "web",
                "api",
                VersionConstraint::parse(">=0.1.0").unwrap(),
                DependencyType::Requires,
            ))
            .unwrap();
        tracker
            .add_dependency(DependencyEdge::new(
                "web",
                "theme",
                VersionConstraint::Any,
                DependencyType::Enhances,
            ))
            .unwrap();
        vc.create_version(patch("api")).unwrap();

        let web = AgentName::from("web");
        let check = vc.check_dependencies_satisfied(&web).unwrap();
        assert!(!check.satisfied);
        assert_eq!(check.edges.len(), 1);
        assert_eq!(check.unsatisfied().count(), 1);

        vc.create_version(CreateVersionRequest::new("api", ChangeType::Minor, "feature"))
            .unwrap();
        assert!(vc.check_dependencies_satisfied(&web).unwrap().satisfied);

        assert!(matches!(
            vc.check_dependencies_satisfied(&AgentName::from("ghost"))
                .unwrap_err(),
            MedicError::Version(VersionError::AgentNotFound { .. })
        ));
    }

    #[test]
    fn test_get_version_not_found() {
        let (vc, _, _) = engine();
        vc.create_version(patch("a")).unwrap();
        let name = AgentName::from("a");
        assert!(vc.get_version(&name, SemVer::new(0, 0, 1)).is_ok());
        assert!(matches!(
            vc.get_version(&name, SemVer::new(9, 0, 0)).unwrap_err(),
            MedicError::Version(VersionError::VersionNotFound { .. })
        ));
        assert_eq!(vc.list_agents().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_creates_are_serialized_per_agent() {
        let (vc, _, _) = engine();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| vc.create_version(patch("busy")).unwrap());
            }
        });
        let history = vc.get_version_history(&AgentName::from("busy")).unwrap();
        let mut versions: Vec<SemVer> = history.iter().map(|r| r.version).collect();
        versions.dedup();
        assert_eq!(versions.len(), 8);
        assert_eq!(
            vc.get_agent(&AgentName::from("busy")).unwrap().current_version,
            SemVer::new(0, 0, 8)
        );
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use medic_core::ImpactThresholds;
    use medic_storage::MemoryStorage;
    use proptest::prelude::*;

    fn arb_change_type() -> impl Strategy<Value = ChangeType> {
        prop_oneof![
            Just(ChangeType::Major),
            Just(ChangeType::Minor),
            Just(ChangeType::Patch),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_versions_strictly_increase(changes in prop::collection::vec(arb_change_type(), 1..12)) {
            let storage = Arc::new(MemoryStorage::new());
            let tracker = Arc::new(
                DependencyTracker::load(storage.clone(), ImpactThresholds::default()).unwrap(),
            );
            let vc = VersionControl::new(storage, tracker);
            let mut last = SemVer::ZERO;
            for change in changes {
                let record = vc
                    .create_version(CreateVersionRequest::new("agent", change, "change"))
                    .unwrap()
                    .record;
                prop_assert!(record.version > last);
                prop_assert_eq!(record.version, last.bump(change).unwrap());
                last = record.version;
            }
        }
    }
}
