//! Health check configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_duration, validate_positive, Validatable};

/// Health check configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Interval between periodic health checks
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Deadline for a single probe; a probe that overruns reports unhealthy
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Number of snapshots kept in history
    pub history_size: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            history_size: 20,
        }
    }
}

impl Validatable for HealthConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_duration(self.interval, "interval", self.domain_name())?;
        validate_duration(self.probe_timeout, "probe_timeout", self.domain_name())?;
        validate_positive(self.history_size, "history_size", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "health"
    }
}
