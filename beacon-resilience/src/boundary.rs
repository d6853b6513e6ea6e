//! Error boundary
//!
//! Routes a classified error to the recovery mechanism its strategy names:
//! retry behind the component's circuit breaker, a fallback chain, degraded
//! operation, or immediate failure. Every handled error is kept in a bounded
//! history from which statistics are derived.

use beacon_config::{CircuitBreakerConfig, ErrorBoundaryConfig, RetryConfig};
use beacon_core::{
    BeaconError, ErrorClassification, ErrorClassifier, ErrorContext, ErrorType, EventBus,
    LifecycleEvent, RecoveryStrategy, Result, Severity,
};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::fallback::{FallbackManager, FallbackOptions};
use crate::retry::RetryStrategy;

/// Component-scoped recovery hook; takes priority over strategy routing
pub type ComponentFallbackHandler =
    Arc<dyn Fn(&BeaconError, &ErrorContext) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Receives components the boundary puts into degraded operation
pub trait DegradationSink: Send + Sync {
    fn component_degraded(&self, component: &str, error: &BeaconError);
}

/// One handled error occurrence
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub error: BeaconError,
    pub context: ErrorContext,
    pub classification: ErrorClassification,
    pub timestamp: DateTime<Utc>,
}

/// Aggregates derived from the error history
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStatistics {
    pub total: usize,
    pub by_type: BTreeMap<ErrorType, usize>,
    pub by_component: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

pub struct ErrorBoundary {
    classifier: ErrorClassifier,
    config: ErrorBoundaryConfig,
    breaker_config: CircuitBreakerConfig,
    retry_config: RetryConfig,
    circuit_breakers: Mutex<HashMap<String, CircuitBreaker>>,
    retry_strategies: Mutex<HashMap<String, Arc<RetryStrategy>>>,
    fallback_handlers: RwLock<HashMap<String, ComponentFallbackHandler>>,
    fallback_manager: Arc<FallbackManager<Value>>,
    history: Mutex<VecDeque<ErrorRecord>>,
    degraded: Mutex<BTreeSet<String>>,
    degradation_sink: Option<Arc<dyn DegradationSink>>,
    events: Option<Arc<dyn EventBus>>,
}

impl ErrorBoundary {
    pub fn new(config: ErrorBoundaryConfig) -> Self {
        Self {
            classifier: ErrorClassifier::new(),
            config,
            breaker_config: CircuitBreakerConfig::default(),
            retry_config: RetryConfig::default(),
            circuit_breakers: Mutex::new(HashMap::new()),
            retry_strategies: Mutex::new(HashMap::new()),
            fallback_handlers: RwLock::new(HashMap::new()),
            fallback_manager: Arc::new(FallbackManager::default()),
            history: Mutex::new(VecDeque::new()),
            degraded: Mutex::new(BTreeSet::new()),
            degradation_sink: None,
            events: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ErrorBoundaryConfig::default())
    }

    /// Config used for circuit breakers created from now on
    pub fn with_circuit_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    /// Config used for retry strategies created from now on
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn with_fallback_manager(mut self, manager: Arc<FallbackManager<Value>>) -> Self {
        self.fallback_manager = manager;
        self
    }

    pub fn with_event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Forward first-time component degradations to `sink`
    pub fn with_degradation_sink(mut self, sink: Arc<dyn DegradationSink>) -> Self {
        self.degradation_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &ErrorBoundaryConfig {
        &self.config
    }

    pub fn fallback_manager(&self) -> &Arc<FallbackManager<Value>> {
        &self.fallback_manager
    }

    /// Run `operation` once; a failure is handed to [`Self::handle_error`]
    pub async fn guard<T, F, Fut>(&self, context: &ErrorContext, mut operation: F) -> Result<T>
    where
        T: DeserializeOwned + Default,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match operation().await {
            Ok(value) => Ok(value),
            Err(error) => self.handle_error(error, context, operation).await,
        }
    }

    /// Handle an error raised by `operation`.
    ///
    /// RETRY re-runs `operation` through the component's retry strategy and
    /// circuit breaker, then tries the operation's fallback chain. FALLBACK
    /// goes straight to the chain. DEGRADE marks the component degraded and
    /// yields `T::default()`. FAIL returns the error untouched.
    pub async fn handle_error<T, F, Fut>(
        &self,
        error: BeaconError,
        context: &ErrorContext,
        operation: F,
    ) -> Result<T>
    where
        T: DeserializeOwned + Default,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let classification = self.record_error(&error, context);

        let handler = self.fallback_handlers.read().get(context.component()).cloned();
        if let Some(handler) = handler {
            info!(
                component = context.component(),
                operation = context.operation(),
                "Invoking component fallback handler"
            );
            let value = handler(&error, context).await?;
            return decode(value);
        }

        match classification.strategy {
            RecoveryStrategy::Retry => self.retry_with_breaker(error, context, operation).await,
            RecoveryStrategy::Fallback => {
                if self.fallback_manager.has_strategy(context.operation()) {
                    self.run_fallback_chain(error, context).await
                } else {
                    debug!(operation = context.operation(), "No fallback chain registered");
                    Err(error)
                }
            }
            RecoveryStrategy::Degrade => {
                self.degrade(&error, context);
                Ok(T::default())
            }
            RecoveryStrategy::Fail => {
                error!(
                    component = context.component(),
                    operation = context.operation(),
                    %error,
                    "Unrecoverable error"
                );
                Err(error)
            }
        }
    }

    async fn retry_with_breaker<T, F, Fut>(
        &self,
        error: BeaconError,
        context: &ErrorContext,
        mut operation: F,
    ) -> Result<T>
    where
        T: DeserializeOwned + Default,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let breaker = self.get_circuit_breaker(context.component());
        let retry = self.get_retry_strategy(context.component());
        let label = context.label();
        let attempts = AtomicU32::new(0);

        // One admission for the whole retry sequence; the deadline bounds
        // each attempt.
        let result = {
            let breaker = &breaker;
            let retry = retry.as_ref();
            let label = label.as_str();
            let attempts = &attempts;
            let operation = &mut operation;
            breaker
                .execute_unbounded(label, move || {
                    retry.execute_with_context(label, move |attempt| {
                        attempts.store(attempt, Ordering::Relaxed);
                        breaker.with_deadline(label, operation())
                    })
                })
                .await
        };
        let attempts = attempts.load(Ordering::Relaxed);

        match result {
            Ok(value) => {
                info!(
                    component = context.component(),
                    operation = context.operation(),
                    attempts,
                    "Recovered by retry"
                );
                Ok(value)
            }
            Err(last_error) => {
                warn!(
                    component = context.component(),
                    operation = context.operation(),
                    attempts,
                    error = %last_error,
                    "Retry did not recover"
                );
                if !self.fallback_manager.has_strategy(context.operation()) {
                    return Err(last_error);
                }
                // A rejection says nothing about the dependency; match the
                // chain against the error that started this.
                let trigger = if last_error.is_circuit_open() {
                    error
                } else {
                    last_error.clone()
                };
                self.run_fallback_chain(trigger, context)
                    .await
                    .map_err(|_| last_error)
            }
        }
    }

    async fn run_fallback_chain<T>(&self, error: BeaconError, context: &ErrorContext) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self
            .fallback_manager
            .recover(context.operation(), error, &FallbackOptions::default())
            .await?;
        info!(
            component = context.component(),
            operation = context.operation(),
            "Recovered by fallback"
        );
        decode(value)
    }

    /// Recovery registered for `context`: the component handler, else the
    /// fallback chain keyed by the operation. `None` when neither exists.
    pub async fn try_fallback(&self, error: &BeaconError, context: &ErrorContext) -> Option<Result<Value>> {
        let handler = self.fallback_handlers.read().get(context.component()).cloned();
        if let Some(handler) = handler {
            return Some(handler(error, context).await);
        }
        if self.fallback_manager.has_strategy(context.operation()) {
            let options = FallbackOptions::default();
            return Some(
                self.fallback_manager
                    .recover(context.operation(), error.clone(), &options)
                    .await,
            );
        }
        None
    }

    fn degrade(&self, error: &BeaconError, context: &ErrorContext) {
        let newly_degraded = self.degraded.lock().insert(context.component().to_string());
        warn!(
            component = context.component(),
            operation = context.operation(),
            %error,
            "Component running degraded"
        );
        if newly_degraded {
            if let Some(sink) = &self.degradation_sink {
                sink.component_degraded(context.component(), error);
            }
            if let Some(events) = &self.events {
                events.emit(LifecycleEvent::ComponentDegraded {
                    component: context.component().to_string(),
                    operation: context.operation().to_string(),
                    error: error.to_string(),
                });
            }
        }
    }

    /// Classify an error and append it to the history without acting on it
    pub fn record_error(&self, error: &BeaconError, context: &ErrorContext) -> ErrorClassification {
        let classification = self.classifier.classify(error, context);
        log_classified(error, context, &classification);

        let mut history = self.history.lock();
        history.push_back(ErrorRecord {
            error: error.clone(),
            context: context.clone(),
            classification,
            timestamp: Utc::now(),
        });
        while history.len() > self.config.history_limit.max(1) {
            history.pop_front();
        }

        classification
    }

    /// Circuit breaker for `component`, created on first use
    pub fn get_circuit_breaker(&self, component: &str) -> CircuitBreaker {
        self.circuit_breakers
            .lock()
            .entry(component.to_string())
            .or_insert_with(|| {
                let breaker = CircuitBreaker::new(component, self.breaker_config.clone());
                match &self.events {
                    Some(events) => breaker.with_event_bus(events.clone()),
                    None => breaker,
                }
            })
            .clone()
    }

    /// Retry strategy for `component`, created on first use.
    ///
    /// Strategies stop early on errors whose classification is not retryable.
    pub fn get_retry_strategy(&self, component: &str) -> Arc<RetryStrategy> {
        self.retry_strategies
            .lock()
            .entry(component.to_string())
            .or_insert_with(|| {
                Arc::new(
                    RetryStrategy::new(self.retry_config.clone())
                        .with_retry_condition(|error| ErrorClassifier::error_type_of(error).is_retryable()),
                )
            })
            .clone()
    }

    /// Install a recovery hook for every error raised by `component`
    pub fn register_fallback_handler<F, Fut>(&self, component: impl Into<String>, handler: F)
    where
        F: Fn(&BeaconError, &ErrorContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let handler: ComponentFallbackHandler =
            Arc::new(move |error: &BeaconError, context: &ErrorContext| -> BoxFuture<'static, Result<Value>> {
                Box::pin(handler(error, context))
            });
        self.fallback_handlers.write().insert(component.into(), handler);
    }

    pub fn remove_fallback_handler(&self, component: &str) -> bool {
        self.fallback_handlers.write().remove(component).is_some()
    }

    pub fn get_error_history(&self) -> Vec<ErrorRecord> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn get_error_statistics(&self) -> ErrorStatistics {
        let history = self.history.lock();
        let mut stats = ErrorStatistics {
            total: history.len(),
            ..Default::default()
        };
        for record in history.iter() {
            *stats.by_type.entry(record.classification.error_type).or_insert(0) += 1;
            *stats
                .by_component
                .entry(record.context.component().to_string())
                .or_insert(0) += 1;
            *stats.by_severity.entry(record.classification.severity).or_insert(0) += 1;
        }
        stats
    }

    /// Empty the history; breakers keep their state
    pub fn clear_error_history(&self) {
        self.history.lock().clear();
    }

    pub fn reset_circuit_breakers(&self) {
        for breaker in self.circuit_breakers.lock().values() {
            breaker.reset();
        }
        info!("All circuit breakers reset");
    }

    pub fn circuit_breakers(&self) -> Vec<CircuitBreaker> {
        self.circuit_breakers.lock().values().cloned().collect()
    }

    pub fn circuit_breaker_states(&self) -> BTreeMap<String, CircuitState> {
        self.circuit_breakers
            .lock()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect()
    }

    pub fn degraded_components(&self) -> Vec<String> {
        self.degraded.lock().iter().cloned().collect()
    }

    pub fn is_component_degraded(&self, component: &str) -> bool {
        self.degraded.lock().contains(component)
    }
}

impl Default for ErrorBoundary {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

fn log_classified(error: &BeaconError, context: &ErrorContext, classification: &ErrorClassification) {
    let component = context.component();
    let operation = context.operation();
    match classification.severity {
        Severity::Low => debug!(
            component,
            operation,
            error_type = %classification.error_type,
            strategy = %classification.strategy,
            %error,
            "Error handled"
        ),
        Severity::Medium | Severity::High => warn!(
            component,
            operation,
            error_type = %classification.error_type,
            strategy = %classification.strategy,
            severity = %classification.severity,
            alert = classification.severity.should_alert(),
            %error,
            "Error handled"
        ),
        Severity::Critical => error!(
            component,
            operation,
            error_type = %classification.error_type,
            strategy = %classification.strategy,
            severity = %classification.severity,
            alert = classification.severity.should_alert(),
            %error,
            "Error handled"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::{FallbackCondition, FallbackLevel};
    use beacon_core::BroadcastEventBus;
    use serde_json::json;
    use std::time::Duration;

    fn boundary() -> ErrorBoundary {
        ErrorBoundary::with_defaults().with_retry_config(RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            jitter: false,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_recovered_by_fallback() {
        let boundary = boundary();
        boundary.fallback_manager().register_level(
            "load_boundaries",
            FallbackLevel::from_data("empty", "Empty features", json!([]))
                .with_condition(FallbackCondition::OnNetworkError),
        );
        let calls = AtomicU32::new(0);
        let context = ErrorContext::new("map", "load_boundaries");

        let result: Result<Vec<String>> = boundary
            .guard(&context, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BeaconError::other("network request failed")) }
            })
            .await;

        assert_eq!(result.unwrap(), Vec::<String>::new());
        // One guarded run plus three retry attempts
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(boundary.get_error_statistics().by_type[&ErrorType::Network], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers() {
        let boundary = boundary();
        let calls = AtomicU32::new(0);

        let result: Result<u32> = boundary
            .handle_error(
                BeaconError::timeout("slow"),
                &ErrorContext::new("search", "index"),
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err(BeaconError::timeout("slow"))
                        } else {
                            Ok(42)
                        }
                    }
                },
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(boundary.get_circuit_breaker("search").state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_runtime_fault_fails_fast() {
        let boundary = boundary();
        let calls = AtomicU32::new(0);
        let error = BeaconError::reference("L is not defined");

        let result: Result<()> = boundary
            .handle_error(error.clone(), &ErrorContext::new("map", "init"), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert_eq!(result.unwrap_err(), error);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(boundary.circuit_breaker_states().is_empty());
    }

    #[tokio::test]
    async fn test_permission_error_degrades() {
        let events = Arc::new(BroadcastEventBus::new());
        let mut rx = events.subscribe();
        let boundary = boundary().with_event_bus(events);

        let result: Result<Vec<u32>> = boundary
            .handle_error(
                BeaconError::other("Geolocation permission denied"),
                &ErrorContext::new("geolocation", "locate"),
                || async { Ok(vec![1]) },
            )
            .await;

        assert_eq!(result.unwrap(), Vec::<u32>::new());
        assert!(boundary.is_component_degraded("geolocation"));
        assert_eq!(boundary.degraded_components(), vec!["geolocation"]);
        assert_eq!(rx.try_recv().unwrap().name(), "component_degraded");
    }

    #[tokio::test]
    async fn test_fallback_strategy_without_chain_rethrows() {
        let boundary = boundary();
        let error = BeaconError::other("invalid postcode format");
        let context = ErrorContext::new("search", "lookup");

        let result: Result<String> = boundary
            .handle_error(error.clone(), &context, || async { Ok("x".to_string()) })
            .await;
        assert_eq!(result.unwrap_err(), error);

        boundary.fallback_manager().register_level(
            "lookup",
            FallbackLevel::from_data("none", "No match", json!("none")),
        );
        let result: Result<String> = boundary
            .handle_error(error, &context, || async { Ok("x".to_string()) })
            .await;
        assert_eq!(result.unwrap(), "none");
    }

    #[tokio::test]
    async fn test_component_handler_takes_priority() {
        let boundary = boundary();
        boundary.register_fallback_handler("sidebar", |error, context| {
            let reply = format!("{}: {}", context.operation(), error.message());
            async move { Ok(json!(reply)) }
        });

        let result: Result<String> = boundary
            .handle_error(
                BeaconError::reference("panel is not defined"),
                &ErrorContext::new("sidebar", "render"),
                || async { Ok(String::new()) },
            )
            .await;

        assert_eq!(result.unwrap(), "render: panel is not defined");
        assert!(boundary.remove_fallback_handler("sidebar"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_still_reaches_fallback() {
        let boundary = boundary().with_circuit_breaker_config(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });
        let calls = AtomicU32::new(0);
        let context = ErrorContext::new("layers", "load_cfa");
        let failing = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<Vec<u32>, _>(BeaconError::network("offline")) }
        };

        let first = boundary
            .handle_error(BeaconError::network("offline"), &context, failing)
            .await;
        assert_eq!(first.unwrap_err(), BeaconError::network("offline"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(boundary.get_circuit_breaker("layers").is_open());

        boundary.fallback_manager().register_level(
            "load_cfa",
            FallbackLevel::from_data("empty", "Empty", json!([]))
                .with_condition(FallbackCondition::OnNetworkError),
        );
        let second = boundary
            .handle_error(BeaconError::network("offline"), &context, failing)
            .await;
        assert_eq!(second.unwrap(), Vec::<u32>::new());
        // Rejected by the open breaker without running the operation
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_memoised_per_component() {
        let boundary = boundary();
        let a = boundary.get_retry_strategy("map");
        let b = boundary.get_retry_strategy("map");
        let c = boundary.get_retry_strategy("search");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.max_attempts(), 3);

        let breaker = boundary.get_circuit_breaker("map");
        assert_eq!(breaker.name(), "map");
        assert_eq!(boundary.circuit_breaker_states().len(), 1);
    }

    #[test]
    fn test_history_is_bounded_and_statistics_derived() {
        let boundary = ErrorBoundary::new(ErrorBoundaryConfig { history_limit: 3 });
        for i in 0..5 {
            let component = if i % 2 == 0 { "map" } else { "search" };
            boundary.record_error(
                &BeaconError::other(format!("fetch failed {i}")),
                &ErrorContext::new(component, "load"),
            );
        }

        let history = boundary.get_error_history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].error, BeaconError::other("fetch failed 2"));

        let stats = boundary.get_error_statistics();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_type[&ErrorType::Network], 3);
        assert_eq!(stats.by_component["map"], 2);
        assert_eq!(stats.by_component["search"], 1);
        assert_eq!(stats.by_severity[&Severity::Medium], 3);

        boundary.clear_error_history();
        assert_eq!(boundary.get_error_statistics(), ErrorStatistics::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_history_keeps_breaker_state() {
        let boundary = boundary().with_circuit_breaker_config(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });
        let _: Result<()> = boundary
            .handle_error(
                BeaconError::network("offline"),
                &ErrorContext::new("layers", "load"),
                || async { Err(BeaconError::network("offline")) },
            )
            .await;

        boundary.clear_error_history();
        assert!(boundary.get_circuit_breaker("layers").is_open());

        boundary.reset_circuit_breakers();
        assert_eq!(boundary.get_circuit_breaker("layers").state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_operation_is_retried_per_attempt() {
        let boundary = ErrorBoundary::with_defaults().with_retry_config(RetryConfig {
            max_retries: 2,
            ..Default::default()
        });
        let calls = AtomicU32::new(0);

        let result: Result<u32> = boundary
            .handle_error(
                BeaconError::timeout("tile request timed out"),
                &ErrorContext::new("tiles", "load"),
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(1)
                    }
                },
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(BeaconError::Timeout(_))));
        assert_eq!(boundary.get_circuit_breaker("tiles").failure_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_failures_keep_every_attempt() {
        let boundary = ErrorBoundary::with_defaults();
        let calls = AtomicU32::new(0);

        let result: Result<u32> = boundary
            .handle_error(
                BeaconError::other("tile server returned 503"),
                &ErrorContext::new("tiles", "load"),
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        tokio::time::sleep(Duration::from_secs(3)).await;
                        Err(BeaconError::other(format!("tile server returned 503 (run {})", n)))
                    }
                },
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            result.unwrap_err(),
            BeaconError::other("tile server returned 503 (run 4)")
        );
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<String>>);

    impl DegradationSink for RecordingSink {
        fn component_degraded(&self, component: &str, error: &BeaconError) {
            self.0.lock().push(format!("{}: {}", component, error));
        }
    }

    #[tokio::test]
    async fn test_degradation_forwarded_to_sink_once() {
        let sink = Arc::new(RecordingSink::default());
        let boundary = boundary().with_degradation_sink(sink.clone());
        let context = ErrorContext::new("geolocation", "locate");

        for _ in 0..2 {
            let result: Result<Vec<f64>> = boundary
                .handle_error(
                    BeaconError::other("Geolocation permission denied"),
                    &context,
                    || async { Ok(vec![0.0]) },
                )
                .await;
            assert_eq!(result.unwrap(), Vec::<f64>::new());
        }

        assert_eq!(
            *sink.0.lock(),
            vec!["geolocation: Geolocation permission denied".to_string()]
        );
    }

    #[tokio::test]
    async fn test_try_fallback_prefers_component_handler() {
        let boundary = boundary();
        let error = BeaconError::other("template missing");
        let context = ErrorContext::new("bootstrap", "sidebar");

        assert!(boundary.try_fallback(&error, &context).await.is_none());

        boundary
            .fallback_manager()
            .register_level("sidebar", FallbackLevel::from_data("plain", "Plain sidebar", json!("plain")));
        let value = boundary.try_fallback(&error, &context).await.unwrap().unwrap();
        assert_eq!(value, json!("plain"));

        boundary.register_fallback_handler("bootstrap", |_error, _context| async { Ok(json!("handler")) });
        let value = boundary.try_fallback(&error, &context).await.unwrap().unwrap();
        assert_eq!(value, json!("handler"));
    }
}
