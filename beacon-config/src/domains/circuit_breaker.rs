//! Circuit breaker configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_duration, validate_positive, Validatable};

/// Circuit breaker configuration, applied to every breaker an error
/// boundary creates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit
    pub failure_threshold: u32,

    /// Per-call deadline; `None` disables enforcement
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Time to wait after the last failure before allowing a trial call
    #[serde(with = "humantime_serde")]
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Some(Duration::from_secs(10)),
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl Validatable for CircuitBreakerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.failure_threshold, "failure_threshold", self.domain_name())?;
        validate_duration(self.reset_timeout, "reset_timeout", self.domain_name())?;
        if let Some(timeout) = self.timeout {
            validate_duration(timeout, "timeout", self.domain_name())?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "circuit_breaker"
    }
}
