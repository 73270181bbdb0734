//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ConfigurationError;
use crate::pipeline::PollSchedule;

/// Settings of the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executions driven at the same time by spawned tasks.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_executions: usize,
    /// Provider poll schedule.
    #[serde(default)]
    pub poll: PollConfig,
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: default_max_concurrent(),
            poll: PollConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Sets the concurrency limit.
    #[must_use]
    pub fn with_max_concurrent_executions(mut self, limit: usize) -> Self {
        self.max_concurrent_executions = limit;
        self
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_concurrent_executions == 0 {
            return Err(ConfigurationError::InvalidEngine(
                "max_concurrent_executions must be at least 1".to_string(),
            ));
        }
        if self.poll.fast_interval_seconds == 0 {
            return Err(ConfigurationError::InvalidEngine(
                "poll.fast_interval_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Poll schedule settings, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval while the job is young.
    #[serde(default = "default_fast_interval")]
    pub fast_interval_seconds: u64,
    /// Interval once the fast phase is over.
    #[serde(default = "default_slow_interval")]
    pub slow_interval_seconds: u64,
    /// Length of the fast phase.
    #[serde(default = "default_fast_phase")]
    pub fast_phase_seconds: u64,
}

fn default_fast_interval() -> u64 {
    15
}

fn default_slow_interval() -> u64 {
    60
}

fn default_fast_phase() -> u64 {
    5 * 60
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            fast_interval_seconds: default_fast_interval(),
            slow_interval_seconds: default_slow_interval(),
            fast_phase_seconds: default_fast_phase(),
        }
    }
}

impl PollConfig {
    /// Builds the poll schedule.
    #[must_use]
    pub fn schedule(&self) -> PollSchedule {
        PollSchedule::new(
            Duration::from_secs(self.fast_interval_seconds),
            Duration::from_secs(self.slow_interval_seconds),
            Duration::from_secs(self.fast_phase_seconds),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        assert_eq!(PollConfig::default().schedule(), PollSchedule::default());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = EngineConfig::default().with_max_concurrent_executions(0);
        assert!(matches!(config.validate(), Err(ConfigurationError::InvalidEngine(_))));
    }
}
