//! Domain-driven configuration for Beacon
//!
//! Configuration is split by functional domain, each with serde defaults
//! and validation, and can be loaded from YAML with `BEACON_*` environment
//! overrides.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    boundary::ErrorBoundaryConfig,
    bootstrap::BootstrapConfig,
    circuit_breaker::CircuitBreakerConfig,
    fallback::{FallbackConfig, FallbackOverrides, FallbackTrigger},
    health::HealthConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    retry::RetryConfig,
    BeaconConfig,
};
