//! Issue detection and recommendations.

use medic_core::{
    AgentName, HealthMetrics, HealthThresholds, Issue, IssueType, Outcome, Priority,
    Recommendation, Severity,
};
use std::collections::BTreeMap;

const TIMEOUT_MARKERS: [&str; 3] = ["timeout", "timed out", "deadline exceeded"];

/// Grouping key for an error message: lowercased, digit runs collapsed to
/// `#`, whitespace collapsed, truncated to `prefix_len` characters.
pub fn normalize_error(message: &str, prefix_len: usize) -> String {
    let mut normalized = String::with_capacity(message.len());
    let mut in_digits = false;
    let mut in_space = false;
    for ch in message.trim().chars() {
        if ch.is_ascii_digit() {
            if !in_digits {
                normalized.push('#');
            }
            in_digits = true;
            in_space = false;
        } else if ch.is_whitespace() {
            if !in_space {
                normalized.push(' ');
            }
            in_space = true;
            in_digits = false;
        } else {
            normalized.extend(ch.to_lowercase());
            in_digits = false;
            in_space = false;
        }
    }
    normalized.chars().take(prefix_len).collect()
}

fn is_timeout(message: &str) -> bool {
    let lower = message.to_lowercase();
    TIMEOUT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Typed issues for a window, most severe first.
pub fn detect_issues(
    agent: &AgentName,
    outcomes: &[Outcome],
    metrics: &HealthMetrics,
    thresholds: &HealthThresholds,
) -> Vec<Issue> {
    let mut issues = Vec::new();
    if metrics.run_count == 0 {
        return issues;
    }

    if metrics.success_rate < thresholds.warning_success_rate {
        let severity = if metrics.success_rate < thresholds.critical_success_rate {
            Severity::Critical
        } else if metrics.success_rate < thresholds.unhealthy_success_rate {
            Severity::High
        } else {
            Severity::Medium
        };
        issues.push(Issue::new(
            agent.clone(),
            IssueType::HighErrorRate,
            severity,
            format!(
                "Error rate {:.1}% over {} runs",
                metrics.error_rate * 100.0,
                metrics.run_count
            ),
        ));
    }

    if metrics.avg_latency_ms > thresholds.max_avg_latency_ms {
        issues.push(Issue::new(
            agent.clone(),
            IssueType::PerformanceDegradation,
            Severity::High,
            format!(
                "Average latency {:.0}ms exceeds {:.0}ms",
                metrics.avg_latency_ms, thresholds.max_avg_latency_ms
            ),
        ));
    }

    if metrics.consecutive_failures >= thresholds.critical_consecutive_failures {
        issues.push(Issue::new(
            agent.clone(),
            IssueType::SlaViolation,
            Severity::Critical,
            format!("{} consecutive failed runs", metrics.consecutive_failures),
        ));
    }

    let messages: Vec<&str> = outcomes
        .iter()
        .filter(|o| !o.success)
        .filter_map(|o| o.error.as_deref())
        .collect();

    let timeouts = messages.iter().filter(|m| is_timeout(m)).count();
    if timeouts > 0 {
        let severity = if timeouts >= thresholds.recurring_error_min_occurrences {
            Severity::High
        } else {
            Severity::Medium
        };
        issues.push(Issue::new(
            agent.clone(),
            IssueType::Timeout,
            severity,
            format!("{timeouts} run(s) timed out"),
        ));
    }

    let mut groups: BTreeMap<String, usize> = BTreeMap::new();
    for message in &messages {
        *groups
            .entry(normalize_error(message, thresholds.recurring_error_prefix_len))
            .or_default() += 1;
    }
    let mut recurring: Vec<(String, usize)> = groups
        .into_iter()
        .filter(|(_, count)| *count >= thresholds.recurring_error_min_occurrences)
        .collect();
    recurring.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (pattern, occurrences) in recurring {
        issues.push(
            Issue::new(
                agent.clone(),
                IssueType::RecurringError,
                Severity::High,
                format!("Error \"{pattern}\" occurred {occurrences} times"),
            )
            .with_pattern(pattern, occurrences),
        );
    }

    issues.sort_by(|a, b| b.severity.cmp(&a.severity));
    issues
}

fn next_steps(issue: &Issue) -> (String, Vec<String>) {
    let steps: &[&str] = match issue.issue_type {
        IssueType::HighErrorRate => &[
            "Inspect the most recent failed runs",
            "Compare against the last healthy version",
            "Roll back if the regression started with a release",
        ],
        IssueType::PerformanceDegradation => &[
            "Profile the slowest runs",
            "Check upstream dependency latency",
            "Review recent changes to hot paths",
        ],
        IssueType::RecurringError => &[
            "Reproduce the recurring error locally",
            "Add handling for the failing input",
            "Add a regression test for the pattern",
        ],
        IssueType::Timeout => &[
            "Check the timeout budget against observed latency",
            "Add retries with backoff for slow calls",
        ],
        IssueType::ResourceExhaustion => &[
            "Check memory and connection usage",
            "Bound caches and pools",
        ],
        IssueType::SlaViolation => &[
            "Escalate to the owning team",
            "Consider an immediate rollback",
        ],
        IssueType::DependencyFailure => &[
            "Check the health of required dependencies",
            "Verify dependency version constraints",
        ],
        IssueType::ConfigurationError => &[
            "Validate the deployed configuration",
            "Diff configuration against the last healthy version",
        ],
    };
    let title = match issue.pattern {
        Some(ref pattern) => format!("Resolve {}: {}", issue.issue_type, pattern.pattern),
        None => format!("Resolve {}", issue.issue_type),
    };
    (title, steps.iter().map(|s| s.to_string()).collect())
}

/// One recommendation per issue, highest priority first.
pub fn recommend(issues: &[Issue]) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = issues
        .iter()
        .map(|issue| {
            let (title, next_steps) = next_steps(issue);
            Recommendation {
                priority: Priority::from(issue.severity),
                title,
                issue_type: Some(issue.issue_type),
                next_steps,
            }
        })
        .collect();
    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}
