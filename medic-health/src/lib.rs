//! MEDIC Health - Health Monitor
//!
//! Derives a health status, typed issues and ranked recommendations from a
//! window of recent run outcomes. Evaluation is a pure function of the window
//! and the configured [`HealthThresholds`](medic_core::HealthThresholds);
//! [`HealthMonitor`] adds per-agent ring buffers and bounded report history.

mod evaluate;
mod issues;
mod monitor;

pub use evaluate::{compute_metrics, compute_trend, derive_status, evaluate};
pub use issues::{detect_issues, normalize_error, recommend};
pub use monitor::HealthMonitor;
