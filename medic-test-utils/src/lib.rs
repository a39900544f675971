//! MEDIC Test Utilities
//!
//! Shared test infrastructure for the MEDIC workspace:
//! - Proptest generators for change types, telemetry windows and acyclic
//!   dependency graphs
//! - Fixtures for common telemetry windows and an in-memory engine
//! - A scripted test runner for driving the testing pipeline

pub use medic_core::{
    AgentName, ChangeType, DependencyEdge, DependencyType, MedicConfig, Outcome, SubTestResult,
    TestOutcome, TestStage, VersionConstraint,
};
pub use medic_engine::Engine;
pub use medic_storage::MemoryStorage;

use async_trait::async_trait;
use chrono::Utc;
use medic_core::{FixProposal, PipelineError};
use medic_remediation::TestRunner;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// GENERATORS
// ============================================================================

pub fn arb_change_type() -> impl Strategy<Value = ChangeType> {
    prop_oneof![
        Just(ChangeType::Major),
        Just(ChangeType::Minor),
        Just(ChangeType::Patch),
    ]
}

pub fn arb_agent_name() -> impl Strategy<Value = AgentName> {
    "[a-z]{3,10}".prop_map(AgentName::from)
}

const ERROR_MESSAGES: [&str; 4] = [
    "connection refused",
    "request timed out",
    "invalid payload at offset 17",
    "worker crashed",
];

/// Outcome windows of up to `max_len` entries with latencies in [0, 20s).
pub fn arb_outcome_window(max_len: usize) -> impl Strategy<Value = Vec<Outcome>> {
    prop::collection::vec(
        (any::<bool>(), 0.0f64..20_000.0, 0..ERROR_MESSAGES.len()),
        0..=max_len,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(success, latency_ms, error)| {
                if success {
                    Outcome::success(latency_ms)
                } else {
                    Outcome::failure(latency_ms, ERROR_MESSAGES[error])
                }
            })
            .collect()
    })
}

/// Acyclic `requires` edges over agents `n0..n{max_nodes}`.
///
/// Every edge points from a higher-numbered agent to a lower-numbered one,
/// so the graph can never contain a cycle.
pub fn arb_dag_edges(max_nodes: usize) -> impl Strategy<Value = Vec<DependencyEdge>> {
    (2..=max_nodes.max(2))
        .prop_flat_map(|n| prop::collection::vec((0..n, 0..n), 0..n * 2))
        .prop_map(|pairs| {
            let mut seen = Vec::new();
            let mut edges = Vec::new();
            for (a, b) in pairs {
                if a == b {
                    continue;
                }
                let (dependent, dependency) = if a > b { (a, b) } else { (b, a) };
                if seen.contains(&(dependent, dependency)) {
                    continue;
                }
                seen.push((dependent, dependency));
                edges.push(DependencyEdge::new(
                    format!("n{dependent}"),
                    format!("n{dependency}"),
                    VersionConstraint::Any,
                    DependencyType::Requires,
                ));
            }
            edges
        })
}

// ============================================================================
// FIXTURES
// ============================================================================

/// `successes` successful outcomes followed by `failures` failures, all at
/// `latency_ms`.
pub fn outcome_window(successes: usize, failures: usize, latency_ms: f64) -> Vec<Outcome> {
    let now = Utc::now();
    (0..successes)
        .map(|_| Outcome::success(latency_ms))
        .chain((0..failures).map(|_| Outcome::failure(latency_ms, "test failure")))
        .map(|mut outcome| {
            outcome.recorded_at = now;
            outcome
        })
        .collect()
}

/// Engine over fresh in-memory storage with default policy, whose test
/// pipeline passes every stage.
pub fn engine_with_memory_storage() -> Arc<Engine> {
    engine_with_runner(Arc::new(ScriptedTestRunner::passing()))
}

pub fn engine_with_runner(runner: Arc<dyn TestRunner>) -> Arc<Engine> {
    match Engine::with_test_runner(
        MedicConfig::default(),
        Arc::new(MemoryStorage::new()),
        runner,
    ) {
        Ok(engine) => Arc::new(engine),
        Err(e) => panic!("default engine failed to initialize: {e}"),
    }
}

// ============================================================================
// SCRIPTED TEST RUNNER
// ============================================================================

/// What a [`ScriptedTestRunner`] does for one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageScript {
    /// A single sub-test with this outcome
    Outcome(TestOutcome),
    /// Exactly these sub-test results
    Results(Vec<SubTestResult>),
    /// The runner itself fails
    RunnerError(String),
    /// Never completes; exercises the stage timeout
    Hang,
}

/// Test runner whose per-stage behaviour is scripted up front. Unscripted
/// stages pass.
#[derive(Debug, Default)]
pub struct ScriptedTestRunner {
    scripts: HashMap<TestStage, StageScript>,
    calls: Mutex<Vec<TestStage>>,
}

impl ScriptedTestRunner {
    pub fn passing() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: TestStage, script: StageScript) -> Self {
        self.scripts.insert(stage, script);
        self
    }

    /// Stages run so far, in call order.
    pub fn calls(&self) -> Vec<TestStage> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl TestRunner for ScriptedTestRunner {
    async fn run_stage(
        &self,
        _proposal: &FixProposal,
        stage: TestStage,
    ) -> Result<Vec<SubTestResult>, PipelineError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(stage);

        let script = self
            .scripts
            .get(&stage)
            .cloned()
            .unwrap_or(StageScript::Outcome(TestOutcome::Pass));
        let name = stage.as_db_str();
        match script {
            StageScript::Outcome(TestOutcome::Pass) => Ok(vec![SubTestResult::pass(name)]),
            StageScript::Outcome(TestOutcome::Fail) => {
                Ok(vec![SubTestResult::fail(name, "scripted failure")])
            }
            StageScript::Outcome(TestOutcome::Skip) => {
                Ok(vec![SubTestResult::skip(name, "scripted skip")])
            }
            StageScript::Outcome(TestOutcome::Error) => {
                Ok(vec![SubTestResult::error(name, "scripted error")])
            }
            StageScript::Results(results) => Ok(results),
            StageScript::RunnerError(reason) => Err(PipelineError::RunnerFailed { stage, reason }),
            StageScript::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                Ok(vec![SubTestResult::error(name, "hang elapsed")])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_window_shape() {
        let window = outcome_window(3, 2, 120.0);
        assert_eq!(window.len(), 5);
        assert!(window[..3].iter().all(|o| o.success));
        assert!(window[3..].iter().all(|o| !o.success && o.error.is_some()));
    }

    #[tokio::test]
    async fn test_scripted_runner_records_calls() {
        let engine = engine_with_memory_storage();
        let runner = ScriptedTestRunner::passing()
            .with_stage(TestStage::Unit, StageScript::Outcome(TestOutcome::Fail));
        let issue = medic_core::Issue::new(
            AgentName::from("api"),
            medic_core::IssueType::Timeout,
            medic_core::Severity::Medium,
            "slow",
        );
        let proposal = engine.proposals().propose(&issue).unwrap();

        let unit = runner.run_stage(&proposal, TestStage::Unit).await.unwrap();
        assert_eq!(unit[0].outcome, TestOutcome::Fail);
        let other = runner.run_stage(&proposal, TestStage::Performance).await.unwrap();
        assert_eq!(other[0].outcome, TestOutcome::Pass);
        assert_eq!(runner.calls(), vec![TestStage::Unit, TestStage::Performance]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_dag_edges_point_downward(edges in arb_dag_edges(8)) {
            for edge in &edges {
                let dependent: usize = edge.dependent.as_str()[1..].parse().unwrap();
                let dependency: usize = edge.dependency.as_str()[1..].parse().unwrap();
                prop_assert!(dependent > dependency);
            }
        }
    }
}
