//! Phased bootstrap configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Defaults applied to phases that do not set their own policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Phase-level re-runs after the first failure
    pub default_max_retries: u32,

    /// Pause between phase-level re-runs
    #[serde(with = "humantime_serde")]
    pub recovery_delay: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 2,
            recovery_delay: Duration::from_millis(100),
        }
    }
}

impl Validatable for BootstrapConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.default_max_retries > 10 {
            return Err(self.validation_error(format!(
                "default_max_retries must be at most 10, got {}",
                self.default_max_retries
            )));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "bootstrap"
    }
}
