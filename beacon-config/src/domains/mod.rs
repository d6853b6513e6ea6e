//! Domain-specific configuration modules

pub mod boundary;
pub mod bootstrap;
pub mod circuit_breaker;
pub mod fallback;
pub mod health;
pub mod logging;
pub mod retry;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Beacon configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct BeaconConfig {
    /// Logging configuration
    pub logging: logging::LoggingConfig,

    /// Per-component circuit breaker defaults
    pub circuit_breaker: circuit_breaker::CircuitBreakerConfig,

    /// Per-component retry defaults
    pub retry: retry::RetryConfig,

    /// Fallback chain defaults
    pub fallback: fallback::FallbackConfig,

    /// Error boundary settings
    pub error_boundary: boundary::ErrorBoundaryConfig,

    /// Health check settings
    pub health: health::HealthConfig,

    /// Phased bootstrap defaults
    pub bootstrap: bootstrap::BootstrapConfig,
}

impl BeaconConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.logging.validate()?;
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        self.fallback.validate()?;
        self.error_boundary.validate()?;
        self.health.validate()?;
        self.bootstrap.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = BeaconConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
