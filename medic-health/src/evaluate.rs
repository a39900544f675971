//! Status, metrics and trend derivation over an outcome window.

use crate::issues::{detect_issues, recommend};
use chrono::Utc;
use medic_core::{
    AgentName, HealthMetrics, HealthReport, HealthStatus, HealthThresholds, Outcome, ReportId,
    Trend,
};

fn success_rate(outcomes: &[Outcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    outcomes.iter().filter(|o| o.success).count() as f64 / outcomes.len() as f64
}

pub fn compute_metrics(outcomes: &[Outcome]) -> HealthMetrics {
    if outcomes.is_empty() {
        return HealthMetrics::default();
    }
    let run_count = outcomes.len();
    let success_rate = success_rate(outcomes);
    let avg_latency_ms = outcomes.iter().map(|o| o.latency_ms).sum::<f64>() / run_count as f64;
    let consecutive_failures = outcomes.iter().rev().take_while(|o| !o.success).count();
    HealthMetrics {
        success_rate,
        error_rate: 1.0 - success_rate,
        avg_latency_ms,
        run_count,
        consecutive_failures,
    }
}

/// Status from metrics. Each rule raises the status to at least its level,
/// so the most severe matching rule wins. An empty window is UNKNOWN.
pub fn derive_status(metrics: &HealthMetrics, thresholds: &HealthThresholds) -> HealthStatus {
    if metrics.run_count == 0 {
        return HealthStatus::Unknown;
    }
    let mut status = if metrics.success_rate < thresholds.critical_success_rate {
        HealthStatus::Critical
    } else if metrics.success_rate < thresholds.unhealthy_success_rate {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Healthy
    };
    if metrics.avg_latency_ms > thresholds.max_avg_latency_ms {
        status = status.at_least(HealthStatus::Unhealthy);
    }
    if metrics.consecutive_failures >= thresholds.critical_consecutive_failures {
        status = status.at_least(HealthStatus::Critical);
    } else if metrics.consecutive_failures >= thresholds.unhealthy_consecutive_failures {
        status = status.at_least(HealthStatus::Unhealthy);
    }
    if metrics.success_rate < thresholds.warning_success_rate {
        status = status.at_least(HealthStatus::Warning);
    }
    status
}

/// First-half against second-half success rate.
pub fn compute_trend(outcomes: &[Outcome], thresholds: &HealthThresholds) -> Trend {
    if outcomes.len() < thresholds.trend_min_samples.max(2) {
        return Trend::InsufficientData;
    }
    let (first, second) = outcomes.split_at(outcomes.len() / 2);
    let delta = success_rate(second) - success_rate(first);
    if delta > thresholds.trend_delta {
        Trend::Improving
    } else if delta < -thresholds.trend_delta {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Full health check over `outcomes`, oldest first.
pub fn evaluate(agent: &AgentName, outcomes: &[Outcome], thresholds: &HealthThresholds) -> HealthReport {
    if outcomes.is_empty() {
        return HealthReport::unknown(agent.clone());
    }
    let metrics = compute_metrics(outcomes);
    let status = derive_status(&metrics, thresholds);
    let issues = detect_issues(agent, outcomes, &metrics, thresholds);
    let recommendations = recommend(&issues);
    HealthReport {
        report_id: ReportId::now_v7(),
        agent: agent.clone(),
        checked_at: Utc::now(),
        status,
        metrics,
        issues,
        recommendations,
        trend: compute_trend(outcomes, thresholds),
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_low_success_rate_never_healthy(
            flags in prop::collection::vec(any::<bool>(), 1..200),
            latency in 0.0f64..20_000.0,
        ) {
            let thresholds = HealthThresholds::default();
            let outcomes: Vec<Outcome> = flags
                .iter()
                .map(|&ok| if ok { Outcome::success(latency) } else { Outcome::failure(latency, "boom") })
                .collect();
            let metrics = compute_metrics(&outcomes);
            let status = derive_status(&metrics, &thresholds);
            if metrics.success_rate < thresholds.critical_success_rate {
                prop_assert_eq!(status, HealthStatus::Critical);
            }
            if metrics.success_rate < thresholds.warning_success_rate {
                prop_assert!(status.rank() >= HealthStatus::Warning.rank());
            }
            prop_assert!(status != HealthStatus::Unknown);
        }
    }
}
