//! MEDIC Versions - Version Control Engine
//!
//! Owns each agent's semantic version history. Version creation and rollback
//! are serialized per agent; different agents proceed in parallel. Every
//! write goes through the storage stamp check, so a concurrent writer in
//! another process surfaces as a conflict instead of a lost update.

mod control;
mod migration;
mod safety;

pub use control::{
    CreateVersionRequest, DependencyCheckResult, EdgeCheck, RollbackResult, VersionControl,
    VersionOutcome,
};
pub use migration::migration_script_stub;
pub use safety::assess_rollback_safety;
