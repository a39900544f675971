//! Fix template catalogue, keyed by issue type.

use medic_core::{IssueType, RiskLevel};

/// What applying a template does to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateAction {
    /// Ship a patch release
    Patch,
    /// Ship a minor release
    Minor,
    /// Roll back to the version before the current one
    RollbackPrevious,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixTemplate {
    pub title: &'static str,
    pub description: &'static str,
    pub risk: RiskLevel,
    pub steps: &'static [&'static str],
    pub effort_hours: f64,
    pub success_probability: f64,
    pub action: TemplateAction,
}

const ROLLBACK_PREVIOUS: FixTemplate = FixTemplate {
    title: "Roll back to previous version",
    description: "Restore the last known version while the regression is investigated.",
    risk: RiskLevel::Medium,
    steps: &[
        "Confirm the regression started with the current version",
        "Roll back to the previous version",
        "Monitor health for one window",
    ],
    effort_hours: 0.5,
    success_probability: 0.75,
    action: TemplateAction::RollbackPrevious,
};

const HIGH_ERROR_RATE: &[FixTemplate] = &[
    FixTemplate {
        title: "Add retry with backoff",
        description: "Retry transient failures with exponential backoff.",
        risk: RiskLevel::Low,
        steps: &[
            "Classify transient versus permanent errors",
            "Wrap failing calls in retry with backoff",
            "Cap total retry time",
        ],
        effort_hours: 2.0,
        success_probability: 0.7,
        action: TemplateAction::Patch,
    },
    FixTemplate {
        title: "Harden input validation",
        description: "Reject malformed inputs before they reach the failing code path.",
        risk: RiskLevel::Low,
        steps: &[
            "Collect inputs from failed runs",
            "Add validation for the failing shapes",
            "Return typed errors for rejected inputs",
        ],
        effort_hours: 3.0,
        success_probability: 0.6,
        action: TemplateAction::Patch,
    },
    ROLLBACK_PREVIOUS,
];

const PERFORMANCE_DEGRADATION: &[FixTemplate] = &[
    FixTemplate {
        title: "Cache expensive lookups",
        description: "Memoize repeated expensive calls on the hot path.",
        risk: RiskLevel::Medium,
        steps: &[
            "Profile the slowest runs",
            "Add a bounded cache for repeated lookups",
            "Add cache invalidation on config change",
            "Benchmark against the previous version",
        ],
        effort_hours: 4.0,
        success_probability: 0.65,
        action: TemplateAction::Minor,
    },
    FixTemplate {
        title: "Tune concurrency limits",
        description: "Reduce contention by adjusting worker and connection limits.",
        risk: RiskLevel::Low,
        steps: &["Measure queue depth", "Adjust worker and pool limits"],
        effort_hours: 1.0,
        success_probability: 0.55,
        action: TemplateAction::Patch,
    },
    ROLLBACK_PREVIOUS,
];

const RECURRING_ERROR: &[FixTemplate] = &[FixTemplate {
    title: "Handle recurring failure pattern",
    description: "Add explicit handling for the recurring error and a regression test.",
    risk: RiskLevel::Low,
    steps: &[
        "Reproduce the recurring error",
        "Handle the failing case explicitly",
        "Add a regression test for the pattern",
    ],
    effort_hours: 2.0,
    success_probability: 0.75,
    action: TemplateAction::Patch,
}];

const TIMEOUT: &[FixTemplate] = &[
    FixTemplate {
        title: "Raise timeout budget",
        description: "Align the timeout with observed latency percentiles.",
        risk: RiskLevel::Low,
        steps: &["Measure latency percentiles", "Raise the timeout above p99"],
        effort_hours: 0.5,
        success_probability: 0.6,
        action: TemplateAction::Patch,
    },
    FixTemplate {
        title: "Split long operations",
        description: "Break long-running work into resumable chunks.",
        risk: RiskLevel::Medium,
        steps: &[
            "Identify the long-running operation",
            "Split it into bounded chunks",
            "Persist progress between chunks",
        ],
        effort_hours: 6.0,
        success_probability: 0.7,
        action: TemplateAction::Minor,
    },
];

const RESOURCE_EXHAUSTION: &[FixTemplate] = &[FixTemplate {
    title: "Bound resource usage",
    description: "Cap caches, buffers and pools that grow without limit.",
    risk: RiskLevel::Medium,
    steps: &[
        "Find unbounded collections",
        "Add capacity limits",
        "Release resources on error paths",
    ],
    effort_hours: 3.0,
    success_probability: 0.65,
    action: TemplateAction::Patch,
}];

const SLA_VIOLATION: &[FixTemplate] = &[
    ROLLBACK_PREVIOUS,
    FixTemplate {
        title: "Emergency hotfix",
        description: "Ship a minimal fix for the failing path.",
        risk: RiskLevel::High,
        steps: &[
            "Identify the failing path",
            "Ship a minimal fix",
            "Schedule a follow-up review",
        ],
        effort_hours: 2.0,
        success_probability: 0.5,
        action: TemplateAction::Patch,
    },
];

const DEPENDENCY_FAILURE: &[FixTemplate] = &[
    FixTemplate {
        title: "Degrade gracefully on dependency failure",
        description: "Fall back to cached or partial results when a dependency fails.",
        risk: RiskLevel::Medium,
        steps: &[
            "Identify the failing dependency",
            "Add a fallback path",
            "Surface degraded mode in results",
        ],
        effort_hours: 4.0,
        success_probability: 0.65,
        action: TemplateAction::Minor,
    },
    ROLLBACK_PREVIOUS,
];

const CONFIGURATION_ERROR: &[FixTemplate] = &[
    FixTemplate {
        title: "Correct configuration",
        description: "Fix the invalid setting and validate configuration on startup.",
        risk: RiskLevel::Low,
        steps: &["Diff against last healthy configuration", "Fix the invalid setting"],
        effort_hours: 0.5,
        success_probability: 0.8,
        action: TemplateAction::Patch,
    },
    ROLLBACK_PREVIOUS,
];

/// Fix templates for an issue type, in catalogue order.
pub fn templates_for(issue_type: IssueType) -> &'static [FixTemplate] {
    match issue_type {
        IssueType::HighErrorRate => HIGH_ERROR_RATE,
        IssueType::PerformanceDegradation => PERFORMANCE_DEGRADATION,
        IssueType::RecurringError => RECURRING_ERROR,
        IssueType::Timeout => TIMEOUT,
        IssueType::ResourceExhaustion => RESOURCE_EXHAUSTION,
        IssueType::SlaViolation => SLA_VIOLATION,
        IssueType::DependencyFailure => DEPENDENCY_FAILURE,
        IssueType::ConfigurationError => CONFIGURATION_ERROR,
    }
}
