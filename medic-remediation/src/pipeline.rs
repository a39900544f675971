//! Testing Pipeline.
//!
//! Stages run in [`TestStage::ORDERED`] order, each under a timeout. A stage
//! fails if any of its sub-tests fails, and the first failing stage stops the
//! run. A proposal is deployment ready only when every executed stage passed
//! or was skipped and at least one stage passed; skips become caveats.

use async_trait::async_trait;
use chrono::Utc;
use medic_core::{
    FixProposal, MedicResult, PipelineError, PipelineReport, ProposalId, ProposalStatus,
    StageResult, SubTestResult, TestOutcome, TestStage, WorkflowError,
};
use medic_storage::{Stamped, StorageTrait};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Executes the sub-tests of one stage for a proposal.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run_stage(
        &self,
        proposal: &FixProposal,
        stage: TestStage,
    ) -> Result<Vec<SubTestResult>, PipelineError>;
}

/// Built-in runner: validates proposal structure and skips every stage that
/// needs an external harness.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralTestRunner;

fn check(name: &str, ok: bool, failure: impl FnOnce() -> String) -> SubTestResult {
    if ok {
        SubTestResult::pass(name)
    } else {
        SubTestResult::fail(name, failure())
    }
}

fn validate_structure(proposal: &FixProposal) -> Vec<SubTestResult> {
    let recommended = proposal.recommended_option();
    vec![
        check("has_options", !proposal.options.is_empty(), || {
            "proposal has no fix options".to_string()
        }),
        check("recommended_in_range", recommended.is_some(), || {
            format!(
                "recommended index {} out of {} options",
                proposal.recommended,
                proposal.options.len()
            )
        }),
        check(
            "recommended_has_steps",
            recommended.is_some_and(|o| !o.steps.is_empty()),
            || "recommended fix has no steps".to_string(),
        ),
        check(
            "probabilities_in_range",
            proposal
                .options
                .iter()
                .all(|o| (0.0..=1.0).contains(&o.success_probability)),
            || "success probability outside [0, 1]".to_string(),
        ),
        check(
            "risk_score_in_range",
            (0.0..=1.0).contains(&proposal.risk.score),
            || format!("risk score {} outside [0, 1]", proposal.risk.score),
        ),
        check("rollback_plan_present", !proposal.rollback_plan.is_empty(), || {
            "proposal has no rollback plan".to_string()
        }),
    ]
}

#[async_trait]
impl TestRunner for StructuralTestRunner {
    async fn run_stage(
        &self,
        proposal: &FixProposal,
        stage: TestStage,
    ) -> Result<Vec<SubTestResult>, PipelineError> {
        Ok(match stage {
            TestStage::StructuralValidation => validate_structure(proposal),
            other => vec![SubTestResult::skip(
                other.as_db_str(),
                "no test harness configured",
            )],
        })
    }
}

/// Fold sub-test outcomes into a stage outcome.
fn stage_outcome(sub_tests: &[SubTestResult]) -> TestOutcome {
    let has = |outcome: TestOutcome| sub_tests.iter().any(|s| s.outcome == outcome);
    if has(TestOutcome::Fail) {
        TestOutcome::Fail
    } else if has(TestOutcome::Error) {
        TestOutcome::Error
    } else if has(TestOutcome::Pass) {
        TestOutcome::Pass
    } else {
        TestOutcome::Skip
    }
}

pub struct TestingPipeline {
    storage: Arc<dyn StorageTrait>,
    runner: Arc<dyn TestRunner>,
    stage_timeout: Duration,
}

impl TestingPipeline {
    pub fn new(
        storage: Arc<dyn StorageTrait>,
        runner: Arc<dyn TestRunner>,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            runner,
            stage_timeout,
        }
    }

    /// Run the proposal's test plan without touching storage.
    pub async fn run_stages(&self, proposal: &FixProposal) -> PipelineReport {
        let mut plan = proposal.test_plan.clone();
        plan.sort();
        plan.dedup();

        let mut stages = Vec::with_capacity(plan.len());
        let mut caveats = Vec::new();
        for stage in plan {
            let started = Instant::now();
            let sub_tests = match tokio::time::timeout(
                self.stage_timeout,
                self.runner.run_stage(proposal, stage),
            )
            .await
            {
                Ok(Ok(sub_tests)) => sub_tests,
                Ok(Err(e)) => {
                    warn!(proposal_id = %proposal.proposal_id, stage = %stage, error = %e, "test runner failed");
                    vec![SubTestResult::error("runner", e.to_string())]
                }
                Err(_) => {
                    let e = PipelineError::TestStageTimeout {
                        stage,
                        timeout: self.stage_timeout,
                    };
                    warn!(proposal_id = %proposal.proposal_id, stage = %stage, timeout_secs = self.stage_timeout.as_secs(), "test stage timed out");
                    vec![SubTestResult::error("timeout", e.to_string())]
                }
            };

            let outcome = stage_outcome(&sub_tests);
            for skipped in sub_tests.iter().filter(|s| s.outcome == TestOutcome::Skip) {
                caveats.push(format!(
                    "{stage}/{} skipped: {}",
                    skipped.name,
                    skipped.message.as_deref().unwrap_or("no reason given")
                ));
            }
            info!(
                proposal_id = %proposal.proposal_id,
                stage = %stage,
                outcome = %outcome,
                sub_tests = sub_tests.len(),
                "test stage finished"
            );
            stages.push(StageResult {
                stage,
                outcome,
                sub_tests,
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
            if outcome == TestOutcome::Fail {
                debug!(proposal_id = %proposal.proposal_id, stage = %stage, "pipeline stopped at failing stage");
                break;
            }
        }

        let deployment_ready = stages
            .iter()
            .all(|s| matches!(s.outcome, TestOutcome::Pass | TestOutcome::Skip))
            && stages.iter().any(|s| s.outcome == TestOutcome::Pass);

        PipelineReport {
            proposal_id: proposal.proposal_id,
            stages,
            deployment_ready,
            caveats,
            completed_at: Utc::now(),
        }
    }

    /// Run the stored proposal through the pipeline and record the result:
    /// `Ready` when deployment ready, `TestFailed` otherwise.
    pub async fn run(&self, proposal_id: ProposalId) -> MedicResult<PipelineReport> {
        let Stamped {
            stamp,
            value: mut proposal,
        } = self
            .storage
            .proposal_get(proposal_id)?
            .ok_or(WorkflowError::ProposalNotFound { proposal_id })?;

        proposal.transition(ProposalStatus::Testing)?;
        let stamp = self.storage.proposal_put(&proposal, Some(stamp))?;
        let mut claim = TestingClaim {
            storage: self.storage.as_ref(),
            proposal_id,
            armed: true,
        };

        let report = self.run_stages(&proposal).await;
        let next = if report.deployment_ready {
            ProposalStatus::Ready
        } else {
            ProposalStatus::TestFailed
        };
        proposal.test_report = Some(report.clone());
        proposal.transition(next)?;
        self.storage.proposal_put(&proposal, Some(stamp))?;
        claim.armed = false;

        info!(
            proposal_id = %proposal_id,
            agent = %proposal.agent,
            deployment_ready = report.deployment_ready,
            caveats = report.caveats.len(),
            "pipeline finished"
        );
        Ok(report)
    }
}

/// Marks a proposal still in `Testing` as `TestFailed` when dropped armed,
/// i.e. when a run is cancelled or fails to record its result.
struct TestingClaim<'a> {
    storage: &'a dyn StorageTrait,
    proposal_id: ProposalId,
    armed: bool,
}

impl Drop for TestingClaim<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match abandon_testing(self.storage, self.proposal_id) {
            Ok(true) => {
                warn!(proposal_id = %self.proposal_id, "pipeline interrupted; proposal marked test_failed")
            }
            Ok(false) => {}
            Err(e) => {
                error!(proposal_id = %self.proposal_id, error = %e, "could not release interrupted proposal")
            }
        }
    }
}

fn abandon_testing(storage: &dyn StorageTrait, proposal_id: ProposalId) -> MedicResult<bool> {
    let Some(Stamped {
        stamp,
        value: mut proposal,
    }) = storage.proposal_get(proposal_id)?
    else {
        return Ok(false);
    };
    if proposal.status != ProposalStatus::Testing {
        return Ok(false);
    }
    proposal.transition(ProposalStatus::TestFailed)?;
    storage.proposal_put(&proposal, Some(stamp))?;
    Ok(true)
}
