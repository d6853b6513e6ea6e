//! Circuit breaker pattern implementation

use beacon_config::CircuitBreakerConfig;
use beacon_core::{BeaconError, EventBus, LifecycleEvent, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests are rejected without running
    Open,
    /// Circuit is half-open, exactly one trial request is allowed
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker metrics
#[derive(Debug, Clone, Default)]
pub struct CircuitMetrics {
    /// Calls admitted by the breaker
    pub total_requests: u64,
    /// Admitted calls that succeeded
    pub total_successes: u64,
    /// Admitted calls that failed, timed out or were cancelled
    pub total_failures: u64,
    /// Calls rejected while open
    pub total_rejected: u64,
    /// Last success time
    pub last_success_time: Option<Instant>,
    /// Last state change time
    pub last_state_change: Option<Instant>,
}

/// Per-key circuit breaker.
///
/// Cloning is cheap and clones share state, so every holder of a clone
/// sees the same failure count.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<CircuitBreakerState>>,
    events: Option<Arc<dyn EventBus>>,
}

struct CircuitBreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    trial_in_flight: bool,
    metrics: CircuitMetrics,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name.into()),
            config: Arc::new(config),
            state: Arc::new(Mutex::new(CircuitBreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                trial_in_flight: false,
                metrics: CircuitMetrics::default(),
            })),
            events: None,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Announce state transitions on `events`
    pub fn with_event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. Reading never transitions; an OPEN breaker only moves
    /// to HALF_OPEN when a call is attempted.
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn failure_count(&self) -> u32 {
        self.state.lock().failure_count
    }

    pub fn last_failure_time(&self) -> Option<Instant> {
        self.state.lock().last_failure_time
    }

    /// Get current metrics
    pub fn metrics(&self) -> CircuitMetrics {
        self.state.lock().metrics.clone()
    }

    /// Run `operation` through the breaker.
    ///
    /// While open (and the reset timeout has not elapsed) the operation is
    /// never invoked and [`BeaconError::CircuitOpen`] is returned. Otherwise
    /// the operation's own error is returned unchanged, except when the
    /// configured per-call timeout elapses first, which yields
    /// [`BeaconError::Timeout`].
    pub async fn execute<F, Fut, T>(&self, label: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_unbounded(label, || self.with_deadline(label, operation()))
            .await
    }

    /// Like [`Self::execute`] but without the per-call timeout.
    ///
    /// For callers that run several calls inside one admission (a retry
    /// loop) and bound each call with [`Self::with_deadline`] themselves.
    pub async fn execute_unbounded<F, Fut, T>(&self, label: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.acquire(label)?;

        let mut guard = CallGuard {
            breaker: self,
            finished: false,
        };
        let result = operation().await;
        guard.finished = true;

        match &result {
            Ok(_) => self.record_success(),
            Err(error) => self.record_failure(label, &error.to_string()),
        }
        result
    }

    /// Bound a single call by the configured per-call timeout.
    ///
    /// Does not touch breaker state. The timeout error carries no label so
    /// its classification depends on the deadline alone.
    pub async fn with_deadline<Fut, T>(&self, label: &str, call: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let Some(deadline) = self.config.timeout else {
            return call.await;
        };

        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(
                    component = %self.name,
                    operation = label,
                    timeout_ms = deadline.as_millis() as u64,
                    "Call exceeded deadline"
                );
                Err(BeaconError::timeout(format!("Call timed out after {:?}", deadline)))
            }
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.last_failure_time = None;
        state.trial_in_flight = false;
        state.metrics = CircuitMetrics::default();
        state.metrics.last_state_change = Some(Instant::now());
    }

    // Internal methods

    fn acquire(&self, label: &str) -> Result<()> {
        let mut state = self.state.lock();

        match state.state {
            CircuitState::Closed => {}
            CircuitState::Open => {
                if self.reset_timeout_elapsed(&state) {
                    self.transition_to_half_open(&mut state);
                    state.trial_in_flight = true;
                } else {
                    return Err(self.reject(&mut state, label));
                }
            }
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    return Err(self.reject(&mut state, label));
                }
                state.trial_in_flight = true;
            }
        }

        state.metrics.total_requests += 1;
        Ok(())
    }

    fn reject(&self, state: &mut CircuitBreakerState, label: &str) -> BeaconError {
        state.metrics.total_rejected += 1;
        tracing::debug!(
            component = %self.name,
            operation = label,
            state = %state.state,
            "Circuit breaker rejected call"
        );
        BeaconError::CircuitOpen {
            component: self.name.to_string(),
        }
    }

    fn reset_timeout_elapsed(&self, state: &CircuitBreakerState) -> bool {
        state
            .last_failure_time
            .map(|last| last.elapsed() >= self.config.reset_timeout)
            .unwrap_or(true)
    }

    fn record_success(&self) {
        let event = {
            let mut state = self.state.lock();
            state.metrics.total_successes += 1;
            state.metrics.last_success_time = Some(Instant::now());
            state.failure_count = 0;
            state.trial_in_flight = false;

            if state.state == CircuitState::HalfOpen {
                self.transition_to_closed(&mut state);
                Some(LifecycleEvent::CircuitClosed {
                    component: self.name.to_string(),
                })
            } else {
                None
            }
        };

        self.emit(event);
    }

    fn record_failure(&self, label: &str, reason: &str) {
        let event = {
            let mut state = self.state.lock();
            state.metrics.total_failures += 1;
            state.failure_count = state.failure_count.saturating_add(1);
            state.last_failure_time = Some(Instant::now());
            state.trial_in_flight = false;

            let should_open = match state.state {
                CircuitState::HalfOpen => true,
                CircuitState::Closed => state.failure_count >= self.config.failure_threshold,
                CircuitState::Open => false,
            };

            if should_open {
                self.transition_to_open(&mut state, label, reason);
                Some(LifecycleEvent::CircuitOpened {
                    component: self.name.to_string(),
                    failure_count: state.failure_count,
                })
            } else {
                None
            }
        };

        self.emit(event);
    }

    fn emit(&self, event: Option<LifecycleEvent>) {
        if let (Some(events), Some(event)) = (&self.events, event) {
            events.emit(event);
        }
    }

    fn transition_to_open(&self, state: &mut CircuitBreakerState, label: &str, reason: &str) {
        state.state = CircuitState::Open;
        state.metrics.last_state_change = Some(Instant::now());
        tracing::warn!(
            component = %self.name,
            operation = label,
            failure_count = state.failure_count,
            reason,
            "Circuit breaker opened"
        );
    }

    fn transition_to_closed(&self, state: &mut CircuitBreakerState) {
        state.state = CircuitState::Closed;
        state.metrics.last_state_change = Some(Instant::now());
        tracing::info!(component = %self.name, "Circuit breaker closed after successful trial call");
    }

    fn transition_to_half_open(&self, state: &mut CircuitBreakerState) {
        state.state = CircuitState::HalfOpen;
        state.metrics.last_state_change = Some(Instant::now());
        tracing::info!(component = %self.name, "Circuit breaker transitioned to half-open state");
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .finish()
    }
}

/// Records a failure if an admitted call is dropped before it finishes, so
/// a cancelled half-open trial cannot leave the breaker wedged.
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    finished: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.breaker.record_failure("cancelled", "call dropped before completion");
        }
    }
}

/// Builder for circuit breakers
pub struct CircuitBreakerBuilder {
    name: String,
    config: CircuitBreakerConfig,
    events: Option<Arc<dyn EventBus>>,
}

impl CircuitBreakerBuilder {
    /// Create a new builder with default config
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: CircuitBreakerConfig::default(),
            events: None,
        }
    }

    /// Set failure threshold
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set per-call timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable per-call timeout enforcement
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set time to wait before allowing a trial call
    pub fn reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.config.reset_timeout = reset_timeout;
        self
    }

    pub fn event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the circuit breaker
    pub fn build(self) -> CircuitBreaker {
        let breaker = CircuitBreaker::new(self.name, self.config);
        match self.events {
            Some(events) => breaker.with_event_bus(events),
            None => breaker,
        }
    }
}
