//! MEDIC Remediation - Fix Proposals, Testing Pipeline, Approval Workflow
//!
//! Issues from the health monitor become ranked [`FixProposal`]s, are
//! validated stage by stage by the [`TestingPipeline`], and are gated by the
//! human-driven [`ApprovalWorkflow`] before the version control engine is
//! invoked.
//!
//! [`FixProposal`]: medic_core::FixProposal

mod catalogue;
mod pipeline;
mod proposal;
mod workflow;

pub use catalogue::{templates_for, FixTemplate, TemplateAction};
pub use pipeline::{StructuralTestRunner, TestRunner, TestingPipeline};
pub use proposal::FixProposalEngine;
pub use workflow::ApprovalWorkflow;
