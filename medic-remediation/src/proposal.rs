//! Fix Proposal Engine.

use crate::catalogue::{templates_for, FixTemplate, TemplateAction};
use chrono::Utc;
use medic_core::{
    AgentName, ChangeType, FixOption, FixProposal, FixSource, Issue, MedicError, MedicResult,
    ProposalId, ProposalStatus, RemediationAction, RemediationConfig, Resolution, RiskAssessment,
    RiskLevel, SemVer, TestStage, ValidationError, VersionError, WorkflowError,
};
use medic_graph::DependencyTracker;
use medic_storage::StorageTrait;
use medic_versions::VersionControl;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

/// Risk contributed by each step of the recommended fix, capped at ten steps.
const STEP_RISK: f64 = 0.02;
const MAX_COUNTED_STEPS: usize = 10;
/// Weight of the estimated failure probability.
const FAILURE_RISK: f64 = 0.3;

pub struct FixProposalEngine {
    storage: Arc<dyn StorageTrait>,
    versions: Arc<VersionControl>,
    tracker: Arc<DependencyTracker>,
    config: RemediationConfig,
}

impl FixProposalEngine {
    pub fn new(
        storage: Arc<dyn StorageTrait>,
        versions: Arc<VersionControl>,
        tracker: Arc<DependencyTracker>,
        config: RemediationConfig,
    ) -> Self {
        Self {
            storage,
            versions,
            tracker,
            config,
        }
    }

    /// Build, rank and store a proposal for `issue`.
    pub fn propose(&self, issue: &Issue) -> MedicResult<FixProposal> {
        let agent = &issue.agent;
        let (current, previous) = match self.versions.get_agent(agent) {
            Ok(known) => (
                known.current_version,
                known
                    .record(known.current_version)
                    .map(|r| r.previous_version),
            ),
            Err(MedicError::Version(VersionError::AgentNotFound { .. })) => (SemVer::ZERO, None),
            Err(e) => return Err(e),
        };
        let resolutions = self.storage.resolution_list(agent, issue.issue_type)?;

        let mut options: Vec<FixOption> = templates_for(issue.issue_type)
            .iter()
            .filter_map(|template| template_option(template, issue, previous))
            .collect();
        if let Some(resolution) = resolutions.last() {
            options.push(self.proven_option(resolution, previous));
        }
        options.sort_by(rank_options);

        let Some(recommended) = options.first().cloned() else {
            return Err(ValidationError::InvalidValue {
                field: "issue_type".to_string(),
                reason: format!("no applicable fix for {} on {agent}", issue.issue_type),
            }
            .into());
        };
        let risk = self.assess(agent, &recommended, current, resolutions.is_empty())?;

        let now = Utc::now();
        let proposal = FixProposal {
            proposal_id: ProposalId::now_v7(),
            agent: agent.clone(),
            issue: issue.clone(),
            implementation_plan: implementation_plan(agent, &recommended),
            test_plan: TestStage::ORDERED.to_vec(),
            rollback_plan: rollback_plan(agent, current, &recommended),
            options,
            recommended: 0,
            risk,
            status: ProposalStatus::Draft,
            test_report: None,
            created_at: now,
            updated_at: now,
        };
        self.storage.proposal_put(&proposal, None)?;
        info!(
            proposal_id = %proposal.proposal_id,
            agent = %agent,
            issue_type = %issue.issue_type,
            options = proposal.options.len(),
            risk = %proposal.risk.level,
            "fix proposal created"
        );
        Ok(proposal)
    }

    fn proven_option(&self, resolution: &Resolution, previous: Option<SemVer>) -> FixOption {
        let action = match &resolution.action {
            RemediationAction::Rollback { force, .. } => match previous {
                Some(target) => RemediationAction::Rollback {
                    target,
                    force: *force,
                },
                None => patch_action(&resolution.fix_title),
            },
            other => other.clone(),
        };
        FixOption {
            title: format!("Proven solution: {}", resolution.fix_title),
            description: format!(
                "Resolved the same issue on {} at {}.",
                resolution.agent,
                resolution.resolved_at.format("%Y-%m-%d %H:%M UTC")
            ),
            source: FixSource::History,
            risk_level: RiskLevel::Low,
            steps: resolution.steps.clone(),
            estimated_effort_hours: 1.0,
            success_probability: self.config.proven_fix_success_probability,
            action,
        }
    }

    fn assess(
        &self,
        agent: &AgentName,
        option: &FixOption,
        current: SemVer,
        no_precedent: bool,
    ) -> MedicResult<RiskAssessment> {
        let counted = option.steps.len().min(MAX_COUNTED_STEPS);
        let mut score = counted as f64 * STEP_RISK
            + option.risk_level.weight()
            + (1.0 - option.success_probability) * FAILURE_RISK;
        let mut factors = vec![
            format!("{counted} implementation step(s)"),
            format!("{} template risk", option.risk_level),
            format!(
                "{:.0}% estimated success probability",
                option.success_probability * 100.0
            ),
        ];
        if no_precedent {
            score += self.config.no_precedent_penalty;
            factors.push("no previous resolution for this issue".to_string());
        }

        let next = match &option.action {
            RemediationAction::CreateVersion { change_type, .. } => current.bump(*change_type)?,
            RemediationAction::Rollback { target, .. } => *target,
        };
        let impact = self.tracker.analyze_update_impact(agent, next)?;
        if impact.total_affected > 0 {
            score += match impact.risk_level {
                RiskLevel::High => 0.2,
                RiskLevel::Medium => 0.1,
                RiskLevel::Low => 0.0,
            };
            factors.push(format!(
                "{} dependent agent(s) affected ({} impact)",
                impact.total_affected, impact.risk_level
            ));
        }

        let score = score.clamp(0.0, 1.0);
        let level = self.config.risk_level(score);
        debug!(agent = %agent, score, level = %level, "risk assessed");
        Ok(RiskAssessment {
            score,
            level,
            factors,
        })
    }

    pub fn get_proposal(&self, proposal_id: ProposalId) -> MedicResult<FixProposal> {
        self.storage
            .proposal_get(proposal_id)?
            .map(|stamped| stamped.value)
            .ok_or_else(|| WorkflowError::ProposalNotFound { proposal_id }.into())
    }

    pub fn list_proposals(&self, agent: Option<&AgentName>) -> MedicResult<Vec<FixProposal>> {
        Ok(self
            .storage
            .proposal_list()?
            .into_iter()
            .filter(|p| agent.map_or(true, |a| &p.agent == a))
            .collect())
    }
}

fn patch_action(title: &str) -> RemediationAction {
    RemediationAction::CreateVersion {
        change_type: ChangeType::Patch,
        description: title.to_string(),
    }
}

fn template_option(template: &FixTemplate, issue: &Issue, previous: Option<SemVer>) -> Option<FixOption> {
    let action = match template.action {
        TemplateAction::Patch => patch_action(template.title),
        TemplateAction::Minor => RemediationAction::CreateVersion {
            change_type: ChangeType::Minor,
            description: template.title.to_string(),
        },
        TemplateAction::RollbackPrevious => RemediationAction::Rollback {
            target: previous?,
            force: false,
        },
    };
    Some(FixOption {
        title: template.title.to_string(),
        description: format!("{} Addresses: {}", template.description, issue.message),
        source: FixSource::Template,
        risk_level: template.risk,
        steps: template.steps.iter().map(|s| s.to_string()).collect(),
        estimated_effort_hours: template.effort_hours,
        success_probability: template.success_probability,
        action,
    })
}

/// Highest success probability first, then lowest risk, then least effort.
fn rank_options(a: &FixOption, b: &FixOption) -> Ordering {
    b.success_probability
        .total_cmp(&a.success_probability)
        .then_with(|| a.risk_level.cmp(&b.risk_level))
        .then_with(|| a.estimated_effort_hours.total_cmp(&b.estimated_effort_hours))
}

fn describe(action: &RemediationAction) -> String {
    match action {
        RemediationAction::CreateVersion {
            change_type,
            description,
        } => format!("create a {change_type} version: {description}"),
        RemediationAction::Rollback { target, force } if *force => {
            format!("force roll back to {target}")
        }
        RemediationAction::Rollback { target, .. } => format!("roll back to {target}"),
    }
}

fn implementation_plan(agent: &AgentName, option: &FixOption) -> Vec<String> {
    let mut plan = option.steps.clone();
    plan.push(format!("Apply to {agent}: {}", describe(&option.action)));
    plan
}

fn rollback_plan(agent: &AgentName, current: SemVer, option: &FixOption) -> Vec<String> {
    match option.action {
        RemediationAction::CreateVersion { .. } => vec![
            format!("Roll {agent} back to {current}"),
            "Re-run the health check and confirm the original issue state".to_string(),
        ],
        RemediationAction::Rollback { .. } => vec![
            format!("Create a new version restoring the code of {current}"),
            "Re-run the health check".to_string(),
        ],
    }
}
