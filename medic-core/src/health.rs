//! Health telemetry and report types

use crate::{AgentName, HealthStatus, IssueId, IssueType, Priority, ReportId, Severity, Timestamp, Trend};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A single run outcome reported by an external caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub latency_ms: f64,
    pub error: Option<String>,
    pub recorded_at: Timestamp,
}

impl Outcome {
    pub fn success(latency_ms: f64) -> Self {
        Self {
            success: true,
            latency_ms,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn failure(latency_ms: f64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            latency_ms,
            error: Some(error.into()),
            recorded_at: Utc::now(),
        }
    }
}

/// Aggregate metrics over a telemetry window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HealthMetrics {
    pub success_rate: f64,
    pub error_rate: f64,
    pub avg_latency_ms: f64,
    pub run_count: usize,
    /// Failures at the tail of the window with no success after them
    pub consecutive_failures: usize,
}

/// Pattern metadata attached to a recurring issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuePattern {
    /// Normalized error-message prefix shared by the group
    pub pattern: String,
    pub occurrences: usize,
}

/// A typed, severity-tagged anomaly detected by the health monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub issue_id: IssueId,
    pub agent: AgentName,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub message: String,
    pub detected_at: Timestamp,
    pub pattern: Option<IssuePattern>,
}

impl Issue {
    pub fn new(
        agent: AgentName,
        issue_type: IssueType,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            issue_id: IssueId::now_v7(),
            agent,
            issue_type,
            severity,
            message: message.into(),
            detected_at: Utc::now(),
            pattern: None,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>, occurrences: usize) -> Self {
        self.pattern = Some(IssuePattern {
            pattern: pattern.into(),
            occurrences,
        });
        self
    }
}

/// An operator-facing recommendation derived from a triggering condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub title: String,
    pub issue_type: Option<IssueType>,
    pub next_steps: Vec<String>,
}

/// Result of a single health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub report_id: ReportId,
    pub agent: AgentName,
    pub checked_at: Timestamp,
    pub status: HealthStatus,
    pub metrics: HealthMetrics,
    pub issues: Vec<Issue>,
    /// Ranked, highest priority first
    pub recommendations: Vec<Recommendation>,
    pub trend: Trend,
}

impl HealthReport {
    /// Report for an agent with no telemetry.
    pub fn unknown(agent: AgentName) -> Self {
        Self {
            report_id: ReportId::now_v7(),
            agent,
            checked_at: Utc::now(),
            status: HealthStatus::Unknown,
            metrics: HealthMetrics::default(),
            issues: Vec::new(),
            recommendations: Vec::new(),
            trend: Trend::InsufficientData,
        }
    }

    pub fn has_issue(&self, issue_type: IssueType) -> bool {
        self.issues.iter().any(|i| i.issue_type == issue_type)
    }
}
