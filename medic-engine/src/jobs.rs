//! Periodic fleet health scan.
//!
//! Checks every agent with telemetry on a fixed interval and, when enabled,
//! opens fix proposals for agents that need attention.

use crate::engine::{Engine, FleetScanSummary};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct FleetScanConfig {
    pub interval: Duration,
    /// Open fix proposals for agents whose status needs attention
    pub propose_fixes: bool,
}

impl Default for FleetScanConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            propose_fixes: false,
        }
    }
}

/// Counters accumulated over the task's lifetime.
#[derive(Debug, Default)]
pub struct FleetScanMetrics {
    pub scans: AtomicU64,
    pub agents_checked: AtomicU64,
    pub proposals_created: AtomicU64,
    pub scan_errors: AtomicU64,
}

impl FleetScanMetrics {
    pub fn snapshot(&self) -> FleetScanSnapshot {
        FleetScanSnapshot {
            scans: self.scans.load(Ordering::Relaxed),
            agents_checked: self.agents_checked.load(Ordering::Relaxed),
            proposals_created: self.proposals_created.load(Ordering::Relaxed),
            scan_errors: self.scan_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FleetScanSnapshot {
    pub scans: u64,
    pub agents_checked: u64,
    pub proposals_created: u64,
    pub scan_errors: u64,
}

/// Run fleet scans until `shutdown_rx` observes `true` or its sender is
/// dropped.
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(fleet_scan_task(engine, FleetScanConfig::default(), shutdown_rx));
/// // ...
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn fleet_scan_task(
    engine: Arc<Engine>,
    config: FleetScanConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<FleetScanMetrics> {
    let metrics = Arc::new(FleetScanMetrics::default());

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        propose_fixes = config.propose_fixes,
        "fleet scan task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("fleet scan task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                scan_once(&engine, &config, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        scans = snapshot.scans,
        agents_checked = snapshot.agents_checked,
        proposals_created = snapshot.proposals_created,
        scan_errors = snapshot.scan_errors,
        "fleet scan task completed"
    );
    metrics
}

async fn scan_once(engine: &Arc<Engine>, config: &FleetScanConfig, metrics: &FleetScanMetrics) {
    metrics.scans.fetch_add(1, Ordering::Relaxed);

    let summary = match engine.spawn_fleet_scan().await {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => {
            metrics.scan_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "fleet scan failed");
            return;
        }
        Err(e) => {
            metrics.scan_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "fleet scan task panicked");
            return;
        }
    };
    metrics
        .agents_checked
        .fetch_add(summary.checked as u64, Ordering::Relaxed);
    metrics
        .scan_errors
        .fetch_add(summary.errors as u64, Ordering::Relaxed);

    if config.propose_fixes && !summary.needing_attention.is_empty() {
        propose_for(engine, summary, metrics).await;
    } else {
        tracing::trace!(checked = summary.checked, "fleet scan cycle completed");
    }
}

async fn propose_for(engine: &Arc<Engine>, summary: FleetScanSummary, metrics: &FleetScanMetrics) {
    let engine = Arc::clone(engine);
    let results = tokio::task::spawn_blocking(move || {
        summary
            .needing_attention
            .into_iter()
            .map(|agent| {
                let result = engine.propose_fixes(&agent);
                (agent, result)
            })
            .collect::<Vec<_>>()
    })
    .await;

    let Ok(results) = results else {
        metrics.scan_errors.fetch_add(1, Ordering::Relaxed);
        tracing::error!("fix proposal task panicked");
        return;
    };
    for (agent, result) in results {
        match result {
            Ok(created) if !created.is_empty() => {
                metrics
                    .proposals_created
                    .fetch_add(created.len() as u64, Ordering::Relaxed);
                tracing::info!(agent = %agent, proposals = created.len(), "fix proposals opened");
            }
            Ok(_) => {}
            Err(e) => {
                metrics.scan_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(agent = %agent, error = %e, "fix proposal failed");
            }
        }
    }
}
