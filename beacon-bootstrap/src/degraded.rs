//! Process-wide degraded mode

use async_trait::async_trait;
use beacon_core::{BeaconError, StateStore};
use beacon_resilience::{ComponentHealth, DegradationSink, HealthProbe};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::keys;

/// Record of one phase that degraded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedModeInfo {
    pub phase: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Degraded mode flag and the phases that caused it.
///
/// Every degradation is kept; [`DegradedMode::info`] reports the latest.
/// The flag and latest record are mirrored into the state store.
pub struct DegradedMode {
    records: RwLock<Vec<DegradedModeInfo>>,
    state: Arc<dyn StateStore>,
}

impl DegradedMode {
    pub fn new(state: Arc<dyn StateStore>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            state,
        }
    }

    /// Mark `phase` degraded by `error`
    pub fn enter(&self, phase: &str, error: &BeaconError) -> DegradedModeInfo {
        let info = DegradedModeInfo {
            phase: phase.to_string(),
            error: error.to_string(),
            timestamp: Utc::now(),
        };
        self.records.write().push(info.clone());

        self.state.set(keys::DEGRADED_MODE, Value::Bool(true));
        match serde_json::to_value(&info) {
            Ok(value) => self.state.set(keys::DEGRADED_MODE_INFO, value),
            Err(err) => warn!(phase, error = %err, "Failed to persist degraded mode info"),
        }

        info
    }

    pub fn is_degraded(&self) -> bool {
        !self.records.read().is_empty()
    }

    /// Latest degradation
    pub fn info(&self) -> Option<DegradedModeInfo> {
        self.records.read().last().cloned()
    }

    /// All degradations in the order they happened
    pub fn records(&self) -> Vec<DegradedModeInfo> {
        self.records.read().clone()
    }

    pub fn degraded_phases(&self) -> Vec<String> {
        self.records.read().iter().map(|info| info.phase.clone()).collect()
    }
}

/// Components the error boundary degrades show up as degraded phases
impl DegradationSink for DegradedMode {
    fn component_degraded(&self, component: &str, error: &BeaconError) {
        self.enter(component, error);
    }
}

/// Reports degraded mode to the health check service
pub struct DegradedModeProbe {
    mode: Arc<DegradedMode>,
}

impl DegradedModeProbe {
    pub fn new(mode: Arc<DegradedMode>) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl HealthProbe for DegradedModeProbe {
    fn name(&self) -> &str {
        "degraded_mode"
    }

    async fn check(&self) -> ComponentHealth {
        let phases = self.mode.degraded_phases();
        if phases.is_empty() {
            ComponentHealth::healthy(self.name())
        } else {
            ComponentHealth::degraded(self.name(), format!("degraded phases: {}", phases.join(", ")))
                .with_metadata("phases", phases)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::InMemoryStateStore;
    use beacon_resilience::HealthStatus;
    use serde_json::json;

    #[test]
    fn test_keeps_every_degradation() {
        let state = Arc::new(InMemoryStateStore::new());
        let mode = DegradedMode::new(state.clone());
        assert!(!mode.is_degraded());
        assert_eq!(mode.info(), None);

        mode.enter("search", &BeaconError::network("geocoder unreachable"));
        mode.enter("weather", &BeaconError::other("feed missing"));

        assert!(mode.is_degraded());
        assert_eq!(mode.info().unwrap().phase, "weather");
        assert_eq!(mode.degraded_phases(), vec!["search", "weather"]);

        assert_eq!(state.get(keys::DEGRADED_MODE), Some(json!(true)));
        let persisted = state.get(keys::DEGRADED_MODE_INFO).unwrap();
        assert_eq!(persisted["phase"], "weather");
        assert_eq!(persisted["error"], "feed missing");
    }

    #[test]
    fn test_boundary_degradation_enters_degraded_mode() {
        let state = Arc::new(InMemoryStateStore::new());
        let mode = DegradedMode::new(state.clone());
        let sink: &dyn DegradationSink = &mode;

        sink.component_degraded("geolocation", &BeaconError::other("permission denied"));

        assert!(mode.is_degraded());
        let info = mode.info().unwrap();
        assert_eq!(info.phase, "geolocation");
        assert_eq!(info.error, "permission denied");
        assert_eq!(state.get(keys::DEGRADED_MODE), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_probe_reports_degraded_phases() {
        let mode = Arc::new(DegradedMode::new(Arc::new(InMemoryStateStore::new())));
        let probe = DegradedModeProbe::new(mode.clone());
        assert_eq!(probe.check().await.status, HealthStatus::Healthy);

        mode.enter("sidebar", &BeaconError::other("template missing"));
        let health = probe.check().await;
        assert_eq!(health.status.label(), "degraded");
        assert_eq!(health.metadata["phases"], json!(["sidebar"]));
    }
}
