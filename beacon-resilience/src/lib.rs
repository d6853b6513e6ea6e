//! Resilience patterns for Beacon
//!
//! This crate provides the machinery the bootstrap uses to start loosely
//! coupled modules without one failure cascading: circuit breakers, retry
//! with exponential backoff, ordered fallback chains, the error boundary
//! that routes a classified error to one of them, and a health check
//! service that aggregates their state.

pub mod backoff;
pub mod boundary;
pub mod circuit_breaker;
pub mod fallback;
pub mod health;
pub mod retry;

// Re-export commonly used types
pub use backoff::BackoffCalculator;
pub use boundary::{
    ComponentFallbackHandler, DegradationSink, ErrorBoundary, ErrorRecord, ErrorStatistics,
};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerBuilder, CircuitMetrics, CircuitState};
pub use fallback::{
    FallbackCondition, FallbackDataType, FallbackLevel, FallbackManager, FallbackMetrics,
    FallbackOptions, FallbackSource, FallbackStrategy,
};
pub use health::{ComponentHealth, HealthCheckService, HealthProbe, HealthSnapshot, HealthStatus};
pub use retry::RetryStrategy;

pub use beacon_config::{
    CircuitBreakerConfig, ErrorBoundaryConfig, FallbackConfig, FallbackOverrides, FallbackTrigger,
    HealthConfig, RetryConfig,
};
