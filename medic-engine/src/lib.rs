//! MEDIC Engine
//!
//! The [`Engine`] facade is the inbound/outbound boundary of MEDIC: outcome
//! reports, version updates and rollbacks go in; health summaries, the
//! dependency graph, open issues and pending workflows come out. Background
//! helpers run fleet scans and test pipelines on tokio tasks.

mod engine;
mod jobs;
pub mod telemetry;

pub use engine::{AgentHealthSummary, Engine, FleetScanSummary, HealthSummary};
pub use jobs::{fleet_scan_task, FleetScanConfig, FleetScanMetrics, FleetScanSnapshot};
pub use telemetry::{init_tracing, TelemetryError};
