//! Phased bootstrap driver

use beacon_config::BootstrapConfig;
use beacon_core::{
    BeaconError, BroadcastEventBus, ErrorContext, EventBus, InMemoryStateStore, LifecycleEvent,
    RecoveryStrategy, Result, ServiceRegistry, StateStore,
};
use beacon_resilience::ErrorBoundary;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::degraded::{DegradedMode, DegradedModeInfo};
use crate::error::BootstrapError;
use crate::keys;
use crate::phase::{PhaseContext, PhaseDescriptor, PhaseOptions, PhaseOutcome};

/// Summary of a finished bootstrap
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BootstrapReport {
    /// Phases that succeeded, in order
    pub completed: Vec<String>,
    /// Completed phases that needed more than one run
    pub recovered: Vec<String>,
    /// Completed phases whose result came from a fallback
    pub fell_back: Vec<String>,
    /// Phases that gave up and left the application degraded
    pub degraded: Vec<String>,
    pub elapsed: Duration,
}

impl BootstrapReport {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

pub struct Bootstrap {
    phases: Vec<PhaseDescriptor>,
    boundary: Arc<ErrorBoundary>,
    services: Arc<ServiceRegistry>,
    state: Arc<dyn StateStore>,
    events: Arc<dyn EventBus>,
    degraded: Arc<DegradedMode>,
    initialized: AtomicBool,
}

impl Bootstrap {
    pub fn builder() -> BootstrapBuilder {
        BootstrapBuilder::new()
    }

    /// Run every declared phase in order.
    ///
    /// Stops at the first phase that fails without being allowed to
    /// degrade. May only be called once.
    pub async fn init(&self) -> std::result::Result<BootstrapReport, BootstrapError> {
        if self.phases.is_empty() {
            return Err(BootstrapError::NoPhases);
        }
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(BootstrapError::AlreadyInitialized);
        }

        let started = Instant::now();
        let mut report = BootstrapReport::default();
        self.state.set(keys::BOOTSTRAP_STATUS, json!("running"));
        info!(phases = self.phases.len(), "Starting bootstrap");

        for phase in &self.phases {
            let run = phase.run.clone();
            let outcome = self
                .safe_execute(
                    &phase.name,
                    |attempt| run(self.phase_context(&phase.name, attempt)),
                    &phase.options,
                )
                .await;

            match outcome {
                Ok(PhaseOutcome::Completed) => report.completed.push(phase.name.clone()),
                Ok(PhaseOutcome::Recovered { .. }) => {
                    report.completed.push(phase.name.clone());
                    report.recovered.push(phase.name.clone());
                }
                Ok(PhaseOutcome::FellBack { .. }) => {
                    report.completed.push(phase.name.clone());
                    report.fell_back.push(phase.name.clone());
                }
                Ok(PhaseOutcome::Degraded { .. }) => report.degraded.push(phase.name.clone()),
                Err(err) => {
                    self.state.set(keys::BOOTSTRAP_STATUS, json!("failed"));
                    self.events.emit(LifecycleEvent::BootstrapFailed {
                        phase: phase.name.clone(),
                        error: err.to_string(),
                    });
                    error!(phase = %phase.name, error = %err, "Bootstrap aborted");
                    return Err(err);
                }
            }
        }

        report.elapsed = started.elapsed();
        let status = if report.is_degraded() { "degraded" } else { "completed" };
        self.state.set(keys::BOOTSTRAP_STATUS, json!(status));
        self.events.emit(LifecycleEvent::BootstrapCompleted {
            degraded: report.is_degraded(),
            elapsed_ms: report.elapsed.as_millis() as u64,
        });
        info!(
            completed = report.completed.len(),
            degraded = report.degraded.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Bootstrap finished"
        );

        Ok(report)
    }

    /// Run one phase function under `options`.
    ///
    /// Failed runs are recorded in the error boundary history. Errors
    /// classified FAIL are not re-run. When the phase cannot be recovered
    /// the boundary's fallback for it is consulted: the `bootstrap`
    /// component handler, else a chain registered under the phase name.
    /// Without a working fallback the phase degrades if allowed, otherwise
    /// [`BootstrapError::Fatal`] is returned.
    pub async fn safe_execute<F, Fut>(
        &self,
        phase: &str,
        mut run: F,
        options: &PhaseOptions,
    ) -> std::result::Result<PhaseOutcome, BootstrapError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let max_attempts = options.max_attempts();
        let context = ErrorContext::builder("bootstrap", phase)
            .metadata("max_attempts", max_attempts)
            .metadata("allow_degradation", options.can_degrade())
            .build();
        let status_key = keys::phase_status(phase);

        self.state.set(&status_key, json!("running"));
        self.events.emit(LifecycleEvent::PhaseStarted {
            phase: phase.to_string(),
        });
        info!(phase, "Starting phase");

        let mut attempt = 1;
        let last_error = loop {
            match run(attempt).await {
                Ok(()) => {
                    self.state.set(&status_key, json!("completed"));
                    self.events.emit(LifecycleEvent::PhaseCompleted {
                        phase: phase.to_string(),
                        attempts: attempt,
                    });
                    info!(phase, attempts = attempt, "Phase completed");
                    return Ok(if attempt == 1 {
                        PhaseOutcome::Completed
                    } else {
                        PhaseOutcome::Recovered { attempts: attempt }
                    });
                }
                Err(error) => {
                    let classification = self.boundary.record_error(&error, &context);
                    if attempt >= max_attempts || classification.strategy == RecoveryStrategy::Fail {
                        break error;
                    }

                    warn!(phase, attempt, max_attempts, %error, "Phase failed, re-running");
                    if !options.recovery_delay.is_zero() {
                        tokio::time::sleep(options.recovery_delay).await;
                    }
                    attempt += 1;
                }
            }
        };

        match self.boundary.try_fallback(&last_error, &context).await {
            Some(Ok(_)) => {
                self.state.set(&status_key, json!("fallback"));
                self.events.emit(LifecycleEvent::PhaseCompleted {
                    phase: phase.to_string(),
                    attempts: attempt,
                });
                info!(phase, attempts = attempt, error = %last_error, "Phase rescued by fallback");
                return Ok(PhaseOutcome::FellBack { attempts: attempt });
            }
            Some(Err(fallback_error)) => {
                warn!(phase, error = %fallback_error, "Phase fallback failed");
            }
            None => {}
        }

        if options.can_degrade() {
            let info = self.enter_degraded_mode(phase, &last_error);
            self.state.set(&status_key, json!("degraded"));
            Ok(PhaseOutcome::Degraded {
                attempts: attempt,
                error: info.error,
            })
        } else {
            self.state.set(&status_key, json!("failed"));
            error!(phase, attempts = attempt, error = %last_error, "Phase failed");
            Err(BootstrapError::Fatal {
                phase: phase.to_string(),
                source: last_error,
            })
        }
    }

    fn enter_degraded_mode(&self, phase: &str, error: &BeaconError) -> DegradedModeInfo {
        let info = self.degraded.enter(phase, error);
        warn!(phase, error = %info.error, "Entering degraded mode");
        self.events.emit(LifecycleEvent::DegradedModeEntered {
            phase: info.phase.clone(),
            error: info.error.clone(),
            timestamp: info.timestamp,
        });
        info
    }

    fn phase_context(&self, phase: &str, attempt: u32) -> PhaseContext {
        PhaseContext {
            phase: phase.to_string(),
            attempt,
            services: self.services.clone(),
            state: self.state.clone(),
            events: self.events.clone(),
        }
    }

    pub fn is_degraded_mode(&self) -> bool {
        self.degraded.is_degraded()
    }

    /// Latest degradation, if any
    pub fn get_degraded_mode_info(&self) -> Option<DegradedModeInfo> {
        self.degraded.info()
    }

    /// Every degradation of this bootstrap
    pub fn degradations(&self) -> Vec<DegradedModeInfo> {
        self.degraded.records()
    }

    pub fn degraded_mode(&self) -> &Arc<DegradedMode> {
        &self.degraded
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|phase| phase.name.as_str()).collect()
    }

    /// Persisted status of `phase`
    pub fn phase_status(&self, phase: &str) -> Option<Value> {
        self.state.get(&keys::phase_status(phase))
    }

    pub fn error_boundary(&self) -> &Arc<ErrorBoundary> {
        &self.boundary
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    pub fn state(&self) -> &Arc<dyn StateStore> {
        &self.state
    }

    pub fn events(&self) -> &Arc<dyn EventBus> {
        &self.events
    }
}

/// Builder for [`Bootstrap`]
pub struct BootstrapBuilder {
    config: BootstrapConfig,
    phases: Vec<PhaseDescriptor>,
    boundary: Option<Arc<ErrorBoundary>>,
    services: Option<Arc<ServiceRegistry>>,
    state: Option<Arc<dyn StateStore>>,
    events: Option<Arc<dyn EventBus>>,
    degraded: Option<Arc<DegradedMode>>,
}

impl BootstrapBuilder {
    pub fn new() -> Self {
        Self {
            config: BootstrapConfig::default(),
            phases: Vec::new(),
            boundary: None,
            services: None,
            state: None,
            events: None,
            degraded: None,
        }
    }

    /// Defaults for phases added with [`Self::required_phase`] and [`Self::optional_phase`]
    pub fn config(mut self, config: BootstrapConfig) -> Self {
        self.config = config;
        self
    }

    pub fn error_boundary(mut self, boundary: Arc<ErrorBoundary>) -> Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn services(mut self, services: Arc<ServiceRegistry>) -> Self {
        self.services = Some(services);
        self
    }

    pub fn state_store(mut self, state: Arc<dyn StateStore>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Share a degraded mode tracker, e.g. one already wired to a health probe
    pub fn degraded_mode(mut self, degraded: Arc<DegradedMode>) -> Self {
        self.degraded = Some(degraded);
        self
    }

    pub fn add_phase(mut self, phase: PhaseDescriptor) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn phase<F, Fut>(self, name: impl Into<String>, options: PhaseOptions, run: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.add_phase(PhaseDescriptor::new(name, options, run))
    }

    pub fn required_phase<F, Fut>(self, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let options = PhaseOptions {
            required: true,
            ..PhaseOptions::from_config(&self.config)
        };
        self.phase(name, options, run)
    }

    pub fn optional_phase<F, Fut>(self, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let options = PhaseOptions::from_config(&self.config).allow_degradation(true);
        self.phase(name, options, run)
    }

    pub fn build(self) -> Bootstrap {
        let state: Arc<dyn StateStore> = self
            .state
            .unwrap_or_else(|| Arc::new(InMemoryStateStore::new()));
        let degraded = self
            .degraded
            .unwrap_or_else(|| Arc::new(DegradedMode::new(state.clone())));

        Bootstrap {
            phases: self.phases,
            boundary: self
                .boundary
                .unwrap_or_else(|| Arc::new(ErrorBoundary::with_defaults())),
            services: self.services.unwrap_or_default(),
            state,
            events: self
                .events
                .unwrap_or_else(|| Arc::new(BroadcastEventBus::new())),
            degraded,
            initialized: AtomicBool::new(false),
        }
    }
}

impl Default for BootstrapBuilder {
    fn default() -> Self {
        Self::new()
    }
}
