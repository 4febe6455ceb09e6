use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected configuration writes. Bad policy values are caught here, at
/// write time, never mid-decision.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_retries must be at least 1")]
    ZeroMaxRetries,
    #[error("auto_repair_threshold must be at least 1")]
    ZeroAutoRepairThreshold,
    #[error("alert_escalation_threshold must be at least 1")]
    ZeroEscalationThreshold,
}

/// Tunable self-healing policy. Read as a snapshot at the start of every
/// engine decision; written only by admin tooling or an accepted learning
/// recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Auto-repair attempts allowed per issue kind per rolling window.
    pub auto_repair_threshold: u32,
    /// Retry bound per incident. Past it the engine escalates, always.
    pub max_retries: u32,
    /// Recurrences of the same issue on a key before forced escalation.
    pub alert_escalation_threshold: u32,
    pub is_active: bool,
}

impl MaintenanceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroMaxRetries);
        }
        if self.auto_repair_threshold == 0 {
            return Err(ConfigError::ZeroAutoRepairThreshold);
        }
        if self.alert_escalation_threshold == 0 {
            return Err(ConfigError::ZeroEscalationThreshold);
        }
        Ok(())
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            auto_repair_threshold: 3,
            max_retries: 3,
            alert_escalation_threshold: 5,
            is_active: true,
        }
    }
}

/// Process-wide pipeline tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// No fresh value within this window triggers a diagnostic.
    pub staleness_window_secs: u64,
    /// Per-step adapter probe timeout; a hang becomes a failed check.
    pub step_timeout_secs: u64,
    /// Occurrences of a pattern before the learning loop reports it.
    pub pattern_threshold: u32,
    /// Rolling window the learning loop aggregates over.
    pub pattern_window_secs: u64,
    /// Learning scheduler tick interval.
    pub learning_interval_secs: u64,
    /// History window for the dashboard's recent events and updates.
    pub recent_window_secs: u64,
    /// Rolling window for the auto-repair budget.
    pub repair_window_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            staleness_window_secs: 900,
            step_timeout_secs: 10,
            pattern_threshold: 3,
            pattern_window_secs: 7 * 24 * 3600,
            learning_interval_secs: 300,
            recent_window_secs: 24 * 3600,
            repair_window_secs: 3600,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            staleness_window_secs: env_u64("GRIDMEND_STALENESS_WINDOW_SECS", d.staleness_window_secs),
            step_timeout_secs: env_u64("GRIDMEND_STEP_TIMEOUT_SECS", d.step_timeout_secs),
            pattern_threshold: env_u64("GRIDMEND_PATTERN_THRESHOLD", d.pattern_threshold as u64)
                as u32,
            pattern_window_secs: env_u64("GRIDMEND_PATTERN_WINDOW_SECS", d.pattern_window_secs),
            learning_interval_secs: env_u64(
                "GRIDMEND_LEARNING_INTERVAL_SECS",
                d.learning_interval_secs,
            ),
            recent_window_secs: env_u64("GRIDMEND_RECENT_WINDOW_SECS", d.recent_window_secs),
            repair_window_secs: env_u64("GRIDMEND_REPAIR_WINDOW_SECS", d.repair_window_secs),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MaintenanceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_max_retries_rejected() {
        let cfg = MaintenanceConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroMaxRetries));
    }

    #[test]
    fn test_zero_thresholds_rejected() {
        let cfg = MaintenanceConfig {
            auto_repair_threshold: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroAutoRepairThreshold));

        let cfg = MaintenanceConfig {
            alert_escalation_threshold: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroEscalationThreshold));
    }
}
