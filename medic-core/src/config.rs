//! Policy and runtime configuration
//!
//! Every section has defaults matching the fleet policy constants, so a config
//! file only needs to name the values it overrides. Unknown keys are rejected.

use crate::{ConfigError, RiskLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file read by [`MedicConfig::load`].
pub const CONFIG_ENV_VAR: &str = "MEDIC_CONFIG";

/// Health status thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthThresholds {
    /// Success rate below this is CRITICAL
    pub critical_success_rate: f64,
    /// Success rate below this is UNHEALTHY
    pub unhealthy_success_rate: f64,
    /// Success rate below this is at least WARNING
    pub warning_success_rate: f64,
    /// Average latency above this is at least UNHEALTHY
    pub max_avg_latency_ms: f64,
    pub critical_consecutive_failures: usize,
    pub unhealthy_consecutive_failures: usize,
    /// Minimum group size for a recurring error
    pub recurring_error_min_occurrences: usize,
    /// Characters of the normalized message used to group errors
    pub recurring_error_prefix_len: usize,
    pub trend_min_samples: usize,
    /// Half-window success rate swing required to report a trend
    pub trend_delta: f64,
    /// Outcomes retained per agent
    pub window_size: usize,
    /// Reports retained per agent
    pub report_history: usize,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            critical_success_rate: 0.70,
            unhealthy_success_rate: 0.85,
            warning_success_rate: 0.95,
            max_avg_latency_ms: 10_000.0,
            critical_consecutive_failures: 5,
            unhealthy_consecutive_failures: 3,
            recurring_error_min_occurrences: 3,
            recurring_error_prefix_len: 50,
            trend_min_samples: 5,
            trend_delta: 0.1,
            window_size: 100,
            report_history: 10,
        }
    }
}

/// Fix proposal scoring and testing policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemediationConfig {
    /// Risk score at or above this is HIGH
    pub high_risk_score: f64,
    /// Risk score at or above this is MEDIUM
    pub medium_risk_score: f64,
    /// Added to the risk score when no historical resolution exists
    pub no_precedent_penalty: f64,
    pub stage_timeout_secs: u64,
    /// Success probability boost for a historically proven fix
    pub proven_fix_success_probability: f64,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            high_risk_score: 0.6,
            medium_risk_score: 0.3,
            no_precedent_penalty: 0.1,
            stage_timeout_secs: 300,
            proven_fix_success_probability: 0.95,
        }
    }
}

impl RemediationConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    /// Classify a risk score.
    pub fn risk_level(&self, score: f64) -> RiskLevel {
        if score >= self.high_risk_score {
            RiskLevel::High
        } else if score >= self.medium_risk_score {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Blast-radius thresholds for update impact analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImpactThresholds {
    /// More affected agents than this is HIGH risk
    pub high_affected: usize,
    /// More affected agents than this is MEDIUM risk
    pub medium_affected: usize,
}

impl Default for ImpactThresholds {
    fn default() -> Self {
        Self {
            high_affected: 5,
            medium_affected: 2,
        }
    }
}

impl ImpactThresholds {
    pub fn risk_level(&self, affected: usize) -> RiskLevel {
        if affected > self.high_affected {
            RiskLevel::High
        } else if affected > self.medium_affected {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Lmdb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Environment directory for the LMDB backend
    pub path: Option<PathBuf>,
    pub map_size_mb: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
            map_size_mb: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Master configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct MedicConfig {
    pub health: HealthThresholds,
    pub remediation: RemediationConfig,
    pub impact: ImpactThresholds,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl MedicConfig {
    /// Load from the file named by `MEDIC_CONFIG` and validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .ok()
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: MedicConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - success-rate thresholds lie in [0, 1] and are ordered critical < unhealthy < warning
    /// - consecutive-failure thresholds are positive and ordered unhealthy <= critical
    /// - window and history sizes are positive
    /// - risk thresholds lie in [0, 1] and are ordered medium <= high
    /// - stage timeout is positive
    /// - the LMDB backend has a path
    pub fn validate(&self) -> Result<(), ConfigError> {
        let h = &self.health;
        for (field, value) in [
            ("health.critical_success_rate", h.critical_success_rate),
            ("health.unhealthy_success_rate", h.unhealthy_success_rate),
            ("health.warning_success_rate", h.warning_success_rate),
            ("health.trend_delta", h.trend_delta),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, value, "must be between 0.0 and 1.0"));
            }
        }
        if !(h.critical_success_rate < h.unhealthy_success_rate
            && h.unhealthy_success_rate < h.warning_success_rate)
        {
            return Err(invalid(
                "health.unhealthy_success_rate",
                h.unhealthy_success_rate,
                "success-rate thresholds must satisfy critical < unhealthy < warning",
            ));
        }
        if h.max_avg_latency_ms <= 0.0 {
            return Err(invalid(
                "health.max_avg_latency_ms",
                h.max_avg_latency_ms,
                "must be positive",
            ));
        }
        if h.unhealthy_consecutive_failures == 0 {
            return Err(invalid(
                "health.unhealthy_consecutive_failures",
                h.unhealthy_consecutive_failures,
                "must be greater than 0",
            ));
        }
        if h.critical_consecutive_failures < h.unhealthy_consecutive_failures {
            return Err(invalid(
                "health.critical_consecutive_failures",
                h.critical_consecutive_failures,
                "must be >= unhealthy_consecutive_failures",
            ));
        }
        for (field, value) in [
            (
                "health.recurring_error_min_occurrences",
                h.recurring_error_min_occurrences,
            ),
            ("health.recurring_error_prefix_len", h.recurring_error_prefix_len),
            ("health.trend_min_samples", h.trend_min_samples),
            ("health.window_size", h.window_size),
            ("health.report_history", h.report_history),
        ] {
            if value == 0 {
                return Err(invalid(field, value, "must be greater than 0"));
            }
        }

        let r = &self.remediation;
        for (field, value) in [
            ("remediation.high_risk_score", r.high_risk_score),
            ("remediation.medium_risk_score", r.medium_risk_score),
            ("remediation.no_precedent_penalty", r.no_precedent_penalty),
            (
                "remediation.proven_fix_success_probability",
                r.proven_fix_success_probability,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, value, "must be between 0.0 and 1.0"));
            }
        }
        if r.medium_risk_score > r.high_risk_score {
            return Err(invalid(
                "remediation.medium_risk_score",
                r.medium_risk_score,
                "must be <= high_risk_score",
            ));
        }
        if r.stage_timeout_secs == 0 {
            return Err(invalid(
                "remediation.stage_timeout_secs",
                r.stage_timeout_secs,
                "must be greater than 0",
            ));
        }

        if self.impact.medium_affected > self.impact.high_affected {
            return Err(invalid(
                "impact.medium_affected",
                self.impact.medium_affected,
                "must be <= high_affected",
            ));
        }

        if self.storage.backend == StorageBackend::Lmdb {
            if self.storage.path.is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "storage.path".to_string(),
                    value: "<unset>".to_string(),
                    reason: "required for the lmdb backend".to_string(),
                });
            }
            if self.storage.map_size_mb == 0 {
                return Err(invalid(
                    "storage.map_size_mb",
                    self.storage.map_size_mb,
                    "must be greater than 0",
                ));
            }
        }

        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.filter".to_string(),
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
