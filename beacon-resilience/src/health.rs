//! Health check service
//!
//! Aggregates registered probes, circuit breaker states and degraded
//! components into one snapshot, on demand or on a timer.

use async_trait::async_trait;
use beacon_config::HealthConfig;
use beacon_core::{EventBus, LifecycleEvent};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::boundary::ErrorBoundary;
use crate::circuit_breaker::CircuitState;

/// Health status of a component or of the whole application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HealthStatus {
    /// Operating normally
    Healthy,
    /// Operational with reduced functionality
    Degraded { reason: String },
    /// Not functioning
    Unhealthy { reason: String },
    /// Status cannot be determined
    Unknown,
}

impl HealthStatus {
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded { .. } => "degraded",
            HealthStatus::Unhealthy { .. } => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Degraded { reason } | HealthStatus::Unhealthy { reason } => {
                write!(f, "{} ({})", self.label(), reason)
            }
            _ => write!(f, "{}", self.label()),
        }
    }
}

/// Health of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub last_checked: DateTime<Utc>,
    pub latency_ms: Option<u64>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ComponentHealth {
    fn with_status(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            message: None,
            last_checked: Utc::now(),
            latency_ms: None,
            metadata: HashMap::new(),
        }
    }

    pub fn healthy(name: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Healthy)
    }

    pub fn degraded(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Degraded { reason: reason.into() })
    }

    pub fn unhealthy(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Unhealthy { reason: reason.into() })
    }

    pub fn unknown(name: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Unknown)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Custom health probe for a named subsystem
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> ComponentHealth;
}

/// Point-in-time aggregate health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub components: Vec<ComponentHealth>,
    pub circuit_breakers: BTreeMap<String, CircuitState>,
    pub degraded_components: Vec<String>,
}

impl HealthSnapshot {
    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|component| component.name == name)
    }
}

pub struct HealthCheckService {
    config: HealthConfig,
    boundary: Option<Arc<ErrorBoundary>>,
    probes: RwLock<Vec<Arc<dyn HealthProbe>>>,
    latest: RwLock<Option<HealthSnapshot>>,
    history: Mutex<VecDeque<HealthSnapshot>>,
    task: Mutex<Option<JoinHandle<()>>>,
    events: Option<Arc<dyn EventBus>>,
}

impl HealthCheckService {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            boundary: None,
            probes: RwLock::new(Vec::new()),
            latest: RwLock::new(None),
            history: Mutex::new(VecDeque::new()),
            task: Mutex::new(None),
            events: None,
        }
    }

    /// Include the boundary's circuit breakers and degraded components
    pub fn with_error_boundary(mut self, boundary: Arc<ErrorBoundary>) -> Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn with_event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    pub fn register_probe(&self, probe: Arc<dyn HealthProbe>) {
        debug!(probe = probe.name(), "Registering health probe");
        self.probes.write().push(probe);
    }

    pub async fn perform_comprehensive_health_check(&self) -> HealthSnapshot {
        let probes = self.probes.read().clone();
        let mut components = Vec::with_capacity(probes.len());

        for probe in probes {
            let started = Instant::now();
            let health = match tokio::time::timeout(self.config.probe_timeout, probe.check()).await {
                Ok(health) => health.with_latency(started.elapsed().as_millis() as u64),
                Err(_) => {
                    warn!(probe = probe.name(), "Health probe timed out");
                    ComponentHealth::unhealthy(
                        probe.name(),
                        format!("probe timed out after {:?}", self.config.probe_timeout),
                    )
                }
            };
            components.push(health);
        }

        let mut circuit_breakers = BTreeMap::new();
        let mut degraded_components = Vec::new();

        if let Some(boundary) = &self.boundary {
            for breaker in boundary.circuit_breakers() {
                let state = breaker.state();
                let name = format!("circuit:{}", breaker.name());
                let health = match state {
                    CircuitState::Closed => ComponentHealth::healthy(name),
                    CircuitState::HalfOpen => ComponentHealth::degraded(name, "circuit breaker half-open"),
                    CircuitState::Open => ComponentHealth::unhealthy(name, "circuit breaker open"),
                };
                components.push(health.with_metadata("failure_count", breaker.failure_count()));
                circuit_breakers.insert(breaker.name().to_string(), state);
            }

            degraded_components = boundary.degraded_components();
            for component in &degraded_components {
                components.push(ComponentHealth::degraded(component.as_str(), "running degraded"));
            }
        }

        let snapshot = HealthSnapshot {
            status: aggregate(&components),
            timestamp: Utc::now(),
            components,
            circuit_breakers,
            degraded_components,
        };

        self.store(snapshot.clone());
        snapshot
    }

    fn store(&self, snapshot: HealthSnapshot) {
        let previous = self
            .latest
            .write()
            .replace(snapshot.clone())
            .map(|previous| previous.status);

        {
            let mut history = self.history.lock();
            history.push_back(snapshot.clone());
            while history.len() > self.config.history_size.max(1) {
                history.pop_front();
            }
        }

        let changed = previous
            .as_ref()
            .map_or(true, |previous| previous.label() != snapshot.status.label());
        if changed {
            info!(status = %snapshot.status, "Health status changed");
            if let Some(events) = &self.events {
                events.emit(LifecycleEvent::HealthChanged {
                    previous: previous
                        .as_ref()
                        .map_or("unknown", HealthStatus::label)
                        .to_string(),
                    current: snapshot.status.label().to_string(),
                });
            }
        }
    }

    pub fn latest_snapshot(&self) -> Option<HealthSnapshot> {
        self.latest.read().clone()
    }

    /// Snapshots from the periodic loop and on-demand checks, oldest first
    pub fn history(&self) -> Vec<HealthSnapshot> {
        self.history.lock().iter().cloned().collect()
    }

    /// Start periodic checks every `interval`; no-op while already running
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let service: Weak<Self> = Arc::downgrade(self);
        let period = self.config.interval;
        info!(interval = ?period, "Starting periodic health checks");

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(service) = service.upgrade() else {
                    break;
                };
                service.perform_comprehensive_health_check().await;
            }
        }));
    }

    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("Stopped periodic health checks");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for HealthCheckService {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

/// Worst status wins; an unknown component counts as degraded
fn aggregate(components: &[ComponentHealth]) -> HealthStatus {
    let unhealthy = names_matching(components, |status| {
        matches!(status, HealthStatus::Unhealthy { .. })
    });
    if !unhealthy.is_empty() {
        return HealthStatus::Unhealthy {
            reason: format!("unhealthy: {}", unhealthy.join(", ")),
        };
    }

    let degraded = names_matching(components, |status| {
        matches!(status, HealthStatus::Degraded { .. } | HealthStatus::Unknown)
    });
    if !degraded.is_empty() {
        return HealthStatus::Degraded {
            reason: format!("degraded: {}", degraded.join(", ")),
        };
    }

    HealthStatus::Healthy
}

fn names_matching(components: &[ComponentHealth], pred: fn(&HealthStatus) -> bool) -> Vec<&str> {
    components
        .iter()
        .filter(|component| pred(&component.status))
        .map(|component| component.name.as_str())
        .collect()
}
