//! Health Monitor with per-agent telemetry windows.

use crate::evaluate::evaluate;
use dashmap::DashMap;
use medic_core::{
    AgentName, HealthReport, HealthStatus, HealthThresholds, Issue, MedicResult, Outcome,
    Timestamp,
};
use medic_storage::StorageTrait;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct HealthMonitor {
    storage: Arc<dyn StorageTrait>,
    thresholds: HealthThresholds,
    /// Ring buffer of recent outcomes per agent, oldest first
    windows: DashMap<AgentName, VecDeque<Outcome>>,
}

impl HealthMonitor {
    pub fn new(storage: Arc<dyn StorageTrait>, thresholds: HealthThresholds) -> Self {
        Self {
            storage,
            thresholds,
            windows: DashMap::new(),
        }
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    /// Append an outcome, evicting the oldest once the window is full.
    pub fn record_outcome(&self, agent: &AgentName, outcome: Outcome) {
        let capacity = self.thresholds.window_size.max(1);
        let mut window = self
            .windows
            .entry(agent.clone())
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        if window.len() == capacity {
            window.pop_front();
        }
        window.push_back(outcome);
        debug!(agent = %agent, window = window.len(), "outcome recorded");
    }

    pub fn report_outcome(
        &self,
        agent: &AgentName,
        success: bool,
        latency_ms: f64,
        error: Option<String>,
    ) {
        let outcome = match (success, error) {
            (true, _) => Outcome::success(latency_ms),
            (false, Some(error)) => Outcome::failure(latency_ms, error),
            (false, None) => Outcome::failure(latency_ms, "unspecified failure"),
        };
        self.record_outcome(agent, outcome);
    }

    /// Snapshot of the current window, oldest first.
    pub fn window(&self, agent: &AgentName) -> Vec<Outcome> {
        self.windows
            .get(agent)
            .map(|w| w.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Agents with at least one recorded outcome, sorted by name.
    pub fn tracked_agents(&self) -> Vec<AgentName> {
        let mut agents: Vec<AgentName> = self.windows.iter().map(|e| e.key().clone()).collect();
        agents.sort();
        agents
    }

    /// Evaluate an explicit window without touching stored state.
    pub fn check_health(&self, agent: &AgentName, outcomes: &[Outcome]) -> HealthReport {
        evaluate(agent, outcomes, &self.thresholds)
    }

    /// Evaluate the agent's current window and store the report.
    pub fn check_agent_health(&self, agent: &AgentName) -> MedicResult<HealthReport> {
        let window = self.window(agent);
        self.store_check(agent, &window)
    }

    /// Like [`Self::check_agent_health`], over outcomes recorded at or after
    /// `since` only.
    pub fn check_agent_health_since(
        &self,
        agent: &AgentName,
        since: Timestamp,
    ) -> MedicResult<HealthReport> {
        let window: Vec<Outcome> = self
            .window(agent)
            .into_iter()
            .filter(|o| o.recorded_at >= since)
            .collect();
        self.store_check(agent, &window)
    }

    fn store_check(&self, agent: &AgentName, window: &[Outcome]) -> MedicResult<HealthReport> {
        let report = self.check_health(agent, window);
        let previous = self.latest_report(agent)?.map(|r| r.status);

        self.storage
            .health_report_append(&report, self.thresholds.report_history.max(1))?;

        if previous != Some(report.status) {
            let from = previous.unwrap_or(HealthStatus::Unknown);
            if report.status.rank() >= HealthStatus::Unhealthy.rank() {
                warn!(agent = %agent, from = %from, to = %report.status, issues = report.issues.len(), "health status changed");
            } else {
                info!(agent = %agent, from = %from, to = %report.status, "health status changed");
            }
        }
        Ok(report)
    }

    /// Stored reports, oldest first.
    pub fn get_health_history(&self, agent: &AgentName) -> MedicResult<Vec<HealthReport>> {
        self.storage.health_report_list(agent)
    }

    pub fn latest_report(&self, agent: &AgentName) -> MedicResult<Option<HealthReport>> {
        Ok(self.storage.health_report_list(agent)?.pop())
    }

    /// Issues from the latest report of `agent`, or of every agent with
    /// stored reports.
    pub fn open_issues(&self, agent: Option<&AgentName>) -> MedicResult<Vec<Issue>> {
        let agents = match agent {
            Some(agent) => vec![agent.clone()],
            None => {
                let mut agents: Vec<AgentName> = self
                    .storage
                    .agent_list()?
                    .into_iter()
                    .map(|a| a.name)
                    .collect();
                for tracked in self.tracked_agents() {
                    if !agents.contains(&tracked) {
                        agents.push(tracked);
                    }
                }
                agents.sort();
                agents
            }
        };
        let mut issues = Vec::new();
        for agent in &agents {
            if let Some(report) = self.latest_report(agent)? {
                issues.extend(report.issues);
            }
        }
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medic_core::IssueType;
    use medic_storage::MemoryStorage;

    fn monitor(window_size: usize, report_history: usize) -> HealthMonitor {
        HealthMonitor::new(
            Arc::new(MemoryStorage::new()),
            HealthThresholds {
                window_size,
                report_history,
                ..HealthThresholds::default()
            },
        )
    }

    #[test]
    fn test_window_is_bounded() {
        let monitor = monitor(5, 10);
        let agent = AgentName::from("api");
        for i in 0..8 {
            monitor.record_outcome(&agent, Outcome::success(i as f64));
        }
        let window = monitor.window(&agent);
        assert_eq!(window.len(), 5);
        assert_eq!(window[0].latency_ms, 3.0);
    }

    #[test]
    fn test_check_stores_bounded_history() {
        let monitor = monitor(100, 3);
        let agent = AgentName::from("api");
        monitor.report_outcome(&agent, true, 100.0, None);
        for _ in 0..5 {
            monitor.check_agent_health(&agent).unwrap();
        }
        let history = monitor.get_health_history(&agent).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].status, HealthStatus::Healthy);
    }

    #[test]
    fn test_check_since_ignores_older_outcomes() {
        let monitor = monitor(100, 10);
        let agent = AgentName::from("api");
        for _ in 0..6 {
            monitor.report_outcome(&agent, false, 10.0, Some("boom".into()));
        }
        let since = chrono::Utc::now();
        for _ in 0..6 {
            monitor.record_outcome(&agent, Outcome::success(10.0));
        }
        let report = monitor.check_agent_health_since(&agent, since).unwrap();
        assert_eq!(report.metrics.run_count, 6);
        assert_eq!(report.status, HealthStatus::Healthy);

        let future = since + chrono::Duration::hours(1);
        let empty = monitor.check_agent_health_since(&agent, future).unwrap();
        assert_eq!(empty.status, HealthStatus::Unknown);
    }

    #[test]
    fn test_unknown_agent_reports_unknown() {
        let monitor = monitor(100, 10);
        let report = monitor.check_agent_health(&AgentName::from("silent")).unwrap();
        assert_eq!(report.status, HealthStatus::Unknown);
    }

    #[test]
    fn test_open_issues_from_latest_reports() {
        let monitor = monitor(100, 10);
        let flaky = AgentName::from("flaky");
        let fine = AgentName::from("fine");
        for i in 0..10 {
            monitor.report_outcome(&flaky, i % 2 == 0, 8000.0, Some("worker crashed".into()));
            monitor.report_outcome(&fine, true, 50.0, None);
        }
        monitor.check_agent_health(&flaky).unwrap();
        monitor.check_agent_health(&fine).unwrap();

        let all = monitor.open_issues(None).unwrap();
        assert!(all.iter().all(|i| i.agent == flaky));
        assert!(all.iter().any(|i| i.issue_type == IssueType::HighErrorRate));
        assert!(monitor.open_issues(Some(&fine)).unwrap().is_empty());
    }
}
