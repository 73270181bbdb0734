//! Stage and retry policy configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::StageKind;
use crate::errors::ConfigurationError;
use crate::pipeline::{RetryPolicy, StageDefinition, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};

/// Configuration of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Unique stage name.
    pub name: String,
    /// External job or local transform.
    pub kind: StageKind,
    /// Timeout ceiling of one attempt in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,
    /// Retry policy.
    #[serde(default)]
    pub retry: RetryPolicyConfig,
    /// Extension of the produced artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_extension: Option<String>,
}

fn default_timeout_seconds() -> f64 {
    StageDefinition::DEFAULT_TIMEOUT.as_secs_f64()
}

impl StageConfig {
    /// Creates a stage configuration with default timeout and retry policy.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: StageKind) -> Self {
        Self {
            name: name.into(),
            kind,
            timeout_seconds: default_timeout_seconds(),
            retry: RetryPolicyConfig::default(),
            output_extension: None,
        }
    }

    /// Sets the timeout in seconds.
    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicyConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Builds the stage definition.
    pub fn to_definition(&self) -> Result<StageDefinition, ConfigurationError> {
        let timeout = Duration::try_from_secs_f64(self.timeout_seconds).map_err(|e| {
            ConfigurationError::InvalidTimeout {
                stage: self.name.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut definition = StageDefinition::new(&self.name, self.kind)
            .with_timeout(timeout)
            .with_retry_policy(self.retry.to_policy(&self.name)?);
        if let Some(extension) = &self.output_extension {
            definition = definition.with_output_extension(extension);
        }
        definition.validate()?;
        Ok(definition)
    }
}

impl From<&StageDefinition> for StageConfig {
    fn from(definition: &StageDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            kind: definition.kind,
            timeout_seconds: definition.timeout.as_secs_f64(),
            retry: RetryPolicyConfig::from(&definition.retry_policy),
            output_extension: definition.output_extension.clone(),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    /// Maximum attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in seconds.
    #[serde(default = "default_base_delay_seconds")]
    pub base_delay_seconds: f64,
    /// Delay cap in seconds; defaults to `base_delay_seconds * 2^6`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_seconds: Option<f64>,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_seconds() -> f64 {
    DEFAULT_BASE_DELAY.as_secs_f64()
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_seconds: default_base_delay_seconds(),
            max_delay_seconds: None,
        }
    }
}

impl RetryPolicyConfig {
    /// Builds the retry policy for the named stage.
    pub fn to_policy(&self, stage: &str) -> Result<RetryPolicy, ConfigurationError> {
        let seconds = |value: f64| {
            Duration::try_from_secs_f64(value).map_err(|e| ConfigurationError::InvalidPolicy {
                stage: stage.to_string(),
                reason: e.to_string(),
            })
        };

        let mut policy = RetryPolicy::with_base_delay(self.max_attempts, seconds(self.base_delay_seconds)?);
        if let Some(max) = self.max_delay_seconds {
            policy = policy.max_delay(seconds(max)?);
        }
        policy.validate(stage)?;
        Ok(policy)
    }
}

impl From<&RetryPolicy> for RetryPolicyConfig {
    fn from(policy: &RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            base_delay_seconds: policy.base_delay.as_secs_f64(),
            max_delay_seconds: Some(policy.max_delay.as_secs_f64()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_runtime_default() {
        let policy = RetryPolicyConfig::default().to_policy("transcode").unwrap();
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn test_negative_delay_rejected() {
        let config = RetryPolicyConfig {
            base_delay_seconds: -1.0,
            ..RetryPolicyConfig::default()
        };
        assert!(matches!(
            config.to_policy("transcode"),
            Err(ConfigurationError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = StageConfig::new("transcribe", StageKind::ExternalJob).with_retry(RetryPolicyConfig {
            max_attempts: 0,
            ..RetryPolicyConfig::default()
        });
        assert!(config.to_definition().is_err());
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let config = StageConfig::new("transcribe", StageKind::ExternalJob).with_timeout_seconds(f64::NAN);
        assert!(matches!(
            config.to_definition(),
            Err(ConfigurationError::InvalidTimeout { .. })
        ));
        let config = StageConfig::new("transcribe", StageKind::ExternalJob).with_timeout_seconds(0.0);
        assert!(config.to_definition().is_err());
    }

    #[test]
    fn test_roundtrip_from_definition() {
        let definition = StageDefinition::external_job("transcode").with_output_extension("mp3");
        let config = StageConfig::from(&definition);
        assert_eq!(config.to_definition().unwrap(), definition);
    }
}
