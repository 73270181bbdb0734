//! Retry policy with capped exponential backoff.
//!
//! The evaluator is pure: given a stage's policy, the attempt that just
//! failed and its classification, it decides whether another attempt is
//! made and how long to wait before it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::StageDefinition;
use crate::errors::{ConfigurationError, ErrorClassification};

/// Default maximum attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Exponent of the default delay cap (`base * 2^6`).
const DEFAULT_CAP_EXPONENT: u32 = 6;

/// Per-stage retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Delay cap.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_base_delay(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    /// Creates a policy with the default cap of `base_delay * 2^6`.
    #[must_use]
    pub fn with_base_delay(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: base_delay.saturating_mul(1 << DEFAULT_CAP_EXPONENT),
        }
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().max_attempts(1)
    }

    /// Delay before the attempt following `attempt`: `base * 2^(attempt-1)`, capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Decides whether the failed `attempt` is followed by another one.
    #[must_use]
    pub fn decide(&self, attempt: u32, classification: ErrorClassification) -> RetryDecision {
        if !classification.is_retryable() {
            return RetryDecision::NotRetryable;
        }
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.delay_for(attempt))
    }

    /// Validates the policy for the named stage.
    pub fn validate(&self, stage: &str) -> Result<(), ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidPolicy {
            stage: stage.to_string(),
            reason: reason.to_string(),
        };

        if self.max_attempts == 0 {
            return Err(invalid("max_attempts must be at least 1"));
        }
        if self.max_delay < self.base_delay {
            return Err(invalid("max_delay must not be shorter than base_delay"));
        }
        Ok(())
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more attempts remain.
    GiveUp,
    /// The classification is not retryable.
    NotRetryable,
}

impl RetryDecision {
    /// Returns true if another attempt will be made.
    #[must_use]
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry(_))
    }

    /// Returns the delay before the next attempt, zero when not retrying.
    #[must_use]
    pub fn delay(&self) -> Duration {
        match self {
            Self::Retry(delay) => *delay,
            Self::GiveUp | Self::NotRetryable => Duration::ZERO,
        }
    }
}

/// Decides whether the failed `attempt` of `stage` is retried.
#[must_use]
pub fn should_retry(
    stage: &StageDefinition,
    attempt: u32,
    classification: ErrorClassification,
) -> RetryDecision {
    stage.retry_policy.decide(attempt, classification)
}
