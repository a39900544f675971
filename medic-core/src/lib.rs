//! MEDIC Core - Entity Types
//!
//! Data structures, policy configuration and the error taxonomy shared by every
//! other MEDIC crate. Behaviour lives in the component crates; the only logic
//! here is what an entity needs to keep its own invariants (semantic version
//! bumps, status transition tables, workflow history folding).

mod agent;
mod config;
mod dependency;
mod enums;
mod error;
mod health;
mod identity;
mod remediation;
mod semver;
mod workflow;

pub use agent::*;
pub use config::*;
pub use dependency::*;
pub use enums::*;
pub use error::*;
pub use health::*;
pub use identity::*;
pub use remediation::*;
pub use semver::*;
pub use workflow::*;
