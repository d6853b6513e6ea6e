//! Retry configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_duration, Validatable};

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Maximum delay between retries
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Growth factor applied per attempt
    pub backoff_multiplier: f64,

    /// Whether to add jitter to retry delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl Validatable for RetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_duration(self.base_delay, "base_delay", self.domain_name())?;
        if self.base_delay > self.max_delay {
            return Err(self.validation_error(format!(
                "base_delay ({:?}) must not exceed max_delay ({:?})",
                self.base_delay, self.max_delay
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(self.validation_error(format!(
                "backoff_multiplier must be at least 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "retry"
    }
}
