//! Composition root wiring the resilience core together

use beacon_config::{BeaconConfig, ConfigLoader};
use beacon_core::{BroadcastEventBus, EventBus, InMemoryStateStore, ServiceRegistry, StateStore};
use beacon_resilience::{ErrorBoundary, FallbackManager, HealthCheckService};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::degraded::{DegradedMode, DegradedModeProbe};
use crate::error::BootstrapError;
use crate::orchestrator::BootstrapBuilder;

/// One consistently injected set of collaborators
pub struct BeaconRuntime {
    config: BeaconConfig,
    events: Arc<dyn EventBus>,
    state: Arc<dyn StateStore>,
    services: Arc<ServiceRegistry>,
    fallback_manager: Arc<FallbackManager<Value>>,
    boundary: Arc<ErrorBoundary>,
    health: Arc<HealthCheckService>,
    degraded: Arc<DegradedMode>,
}

impl BeaconRuntime {
    /// Build every collaborator from a validated configuration
    pub fn from_config(config: &BeaconConfig) -> Result<Self, BootstrapError> {
        config.validate_all()?;

        let events: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::new());
        let state: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let services = Arc::new(ServiceRegistry::new());
        let fallback_manager = Arc::new(FallbackManager::new(config.fallback.clone()));

        let degraded = Arc::new(DegradedMode::new(state.clone()));
        let boundary = Arc::new(
            ErrorBoundary::new(config.error_boundary.clone())
                .with_circuit_breaker_config(config.circuit_breaker.clone())
                .with_retry_config(config.retry.clone())
                .with_fallback_manager(fallback_manager.clone())
                .with_event_bus(events.clone())
                .with_degradation_sink(degraded.clone()),
        );

        let health = Arc::new(
            HealthCheckService::new(config.health.clone())
                .with_error_boundary(boundary.clone())
                .with_event_bus(events.clone()),
        );
        health.register_probe(Arc::new(DegradedModeProbe::new(degraded.clone())));

        info!("Beacon runtime assembled");

        Ok(Self {
            config: config.clone(),
            events,
            state,
            services,
            fallback_manager,
            boundary,
            health,
            degraded,
        })
    }

    /// Load configuration (file, then environment overrides) and build
    pub fn load(config_path: Option<&Path>) -> Result<Self, BootstrapError> {
        let config = ConfigLoader::new().load(config_path)?;
        Self::from_config(&config)
    }

    /// Install the global tracing subscriber described by the logging config
    pub fn init_logging(&self) -> anyhow::Result<()> {
        beacon_logging::init_logging_from_config(&self.config.logging)
    }

    /// Bootstrap builder preloaded with this runtime's collaborators
    pub fn bootstrap(&self) -> BootstrapBuilder {
        BootstrapBuilder::new()
            .config(self.config.bootstrap.clone())
            .error_boundary(self.boundary.clone())
            .services(self.services.clone())
            .state_store(self.state.clone())
            .event_bus(self.events.clone())
            .degraded_mode(self.degraded.clone())
    }

    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<dyn EventBus> {
        &self.events
    }

    pub fn state(&self) -> &Arc<dyn StateStore> {
        &self.state
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    pub fn fallback_manager(&self) -> &Arc<FallbackManager<Value>> {
        &self.fallback_manager
    }

    pub fn error_boundary(&self) -> &Arc<ErrorBoundary> {
        &self.boundary
    }

    pub fn health(&self) -> &Arc<HealthCheckService> {
        &self.health
    }

    pub fn degraded_mode(&self) -> &Arc<DegradedMode> {
        &self.degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use beacon_config::RetryConfig;
    use beacon_core::{BeaconError, ErrorContext};

    #[test]
    fn test_rejects_invalid_config() {
        let config = BeaconConfig {
            retry: RetryConfig {
                backoff_multiplier: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            BeaconRuntime::from_config(&config),
            Err(BootstrapError::Config(_))
        ));
    }

    #[test]
    fn test_wires_shared_collaborators() {
        let runtime = BeaconRuntime::from_config(&BeaconConfig::default()).unwrap();
        assert!(Arc::ptr_eq(
            runtime.fallback_manager(),
            runtime.error_boundary().fallback_manager()
        ));
        assert_eq!(runtime.error_boundary().config().history_limit, 100);
        assert!(!runtime.degraded_mode().is_degraded());
    }

    #[tokio::test]
    async fn test_boundary_degrade_reaches_degraded_mode() {
        let runtime = BeaconRuntime::from_config(&BeaconConfig::default()).unwrap();
        let context = ErrorContext::new("geolocation", "locate");

        let result: beacon_core::Result<Vec<u32>> = runtime
            .error_boundary()
            .handle_error(
                BeaconError::other("Geolocation permission denied"),
                &context,
                || async { Ok(vec![1]) },
            )
            .await;

        assert_eq!(result.unwrap(), Vec::<u32>::new());
        assert!(runtime.degraded_mode().is_degraded());
        assert_eq!(runtime.degraded_mode().info().unwrap().phase, "geolocation");
        assert_eq!(runtime.state().get(keys::DEGRADED_MODE), Some(Value::Bool(true)));
    }
}
