//! Priority-ordered fallback chain for one operation

use beacon_config::FallbackConfig;
use beacon_core::{BeaconError, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{
    FallbackCondition, FallbackDataType, FallbackLevel, FallbackMetrics, FallbackOptions,
    FallbackSource,
};

struct CacheEntry<T> {
    data: T,
    stored_at: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

#[derive(Default)]
struct MetricsState {
    metrics: FallbackMetrics,
    latencies: VecDeque<Duration>,
}

/// Fallback chain for one logical operation.
///
/// Levels are consulted in ascending priority; registration order breaks
/// ties. Each call works on a snapshot of the chain, so levels may be added
/// while calls are in flight.
pub struct FallbackStrategy<T> {
    name: String,
    config: FallbackConfig,
    condition: FallbackCondition,
    levels: RwLock<Vec<FallbackLevel<T>>>,
    cache: Mutex<HashMap<String, CacheEntry<T>>>,
    metrics: Mutex<MetricsState>,
}

impl<T> FallbackStrategy<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, config: FallbackConfig) -> Self {
        let condition = FallbackCondition::from(config.condition);
        Self {
            name: name.into(),
            config,
            condition,
            levels: RwLock::new(Vec::new()),
            cache: Mutex::new(HashMap::new()),
            metrics: Mutex::new(MetricsState::default()),
        }
    }

    /// Replace the operation-level condition, e.g. with a custom predicate
    pub fn with_condition(mut self, condition: FallbackCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// Register a level, keeping the chain sorted by priority
    pub fn add_level(&self, level: FallbackLevel<T>) {
        debug!(strategy = %self.name, level = %level.id, priority = level.priority, "Registering fallback level");
        let mut levels = self.levels.write();
        levels.retain(|existing| existing.id != level.id);
        levels.push(level);
        levels.sort_by_key(|level| level.priority);
    }

    /// Remove a level by id, returning whether it existed
    pub fn remove_level(&self, id: &str) -> bool {
        let mut levels = self.levels.write();
        let before = levels.len();
        levels.retain(|level| level.id != id);
        self.cache.lock().remove(id);
        levels.len() != before
    }

    /// Level ids in execution order
    pub fn level_ids(&self) -> Vec<String> {
        self.levels.read().iter().map(|level| level.id.clone()).collect()
    }

    pub fn level_count(&self) -> usize {
        self.levels.read().len()
    }

    /// Run `primary`, falling through the chain if it fails.
    ///
    /// When no level produces a value the primary's error is returned, not
    /// the error of the last level.
    pub async fn execute<F, Fut>(&self, primary: F, options: &FallbackOptions) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.metrics.lock().metrics.total_attempts += 1;

        match primary().await {
            Ok(value) => {
                self.metrics.lock().metrics.primary_successes += 1;
                Ok(value)
            }
            Err(primary_error) => self.run_chain(primary_error, options).await,
        }
    }

    /// Walk the chain for an error produced elsewhere
    pub async fn recover(&self, error: BeaconError, options: &FallbackOptions) -> Result<T> {
        self.metrics.lock().metrics.total_attempts += 1;
        self.run_chain(error, options).await
    }

    async fn run_chain(&self, primary_error: BeaconError, options: &FallbackOptions) -> Result<T> {
        if !self.config.enabled || !self.should_use_fallback(&primary_error, options) {
            debug!(strategy = %self.name, error = %primary_error, "Fallback not applicable");
            self.metrics.lock().metrics.total_failures += 1;
            return Err(primary_error);
        }

        let started = Instant::now();
        let levels = self.levels.read().clone();

        for level in levels.iter().filter(|level| level.enabled) {
            if !level.condition.matches(&primary_error) {
                continue;
            }

            if level.data_type == FallbackDataType::Cached && !options.skip_cache {
                if let Some(value) = self.cached(&level.id) {
                    debug!(strategy = %self.name, level = %level.id, "Serving cached fallback");
                    let mut state = self.metrics.lock();
                    state.metrics.cache_hits += 1;
                    drop(state);
                    self.record_success(&level.id, started.elapsed());
                    return Ok(value);
                }
            }

            let outcome = match &level.source {
                FallbackSource::Data(data) => Ok(data.clone()),
                FallbackSource::Operation(operation) => operation(&primary_error, options).await,
            };

            match outcome {
                Ok(value) => {
                    if level.data_type == FallbackDataType::Cached && self.config.cache_fallback_data {
                        let ttl = level.cache_ttl.unwrap_or(self.config.cache_ttl);
                        self.store(&level.id, value.clone(), ttl);
                    }
                    self.record_success(&level.id, started.elapsed());
                    info!(
                        strategy = %self.name,
                        level = %level.id,
                        error = %primary_error,
                        "Fallback level succeeded"
                    );
                    return Ok(value);
                }
                Err(level_error) => {
                    warn!(strategy = %self.name, level = %level.id, error = %level_error, "Fallback level failed");
                    let mut state = self.metrics.lock();
                    *state
                        .metrics
                        .fallback_failures_by_level
                        .entry(level.id.clone())
                        .or_insert(0) += 1;
                }
            }
        }

        error!(strategy = %self.name, error = %primary_error, "All fallback levels exhausted");
        self.metrics.lock().metrics.total_failures += 1;
        Err(primary_error)
    }

    fn should_use_fallback(&self, error: &BeaconError, options: &FallbackOptions) -> bool {
        options
            .condition
            .as_ref()
            .unwrap_or(&self.condition)
            .matches(error)
    }

    fn cached(&self, level_id: &str) -> Option<T> {
        let mut cache = self.cache.lock();
        let expired = cache.get(level_id)?.is_expired(Instant::now());
        if expired {
            cache.remove(level_id);
            return None;
        }
        cache.get(level_id).map(|entry| entry.data.clone())
    }

    fn store(&self, level_id: &str, data: T, ttl: Duration) {
        self.cache.lock().insert(
            level_id.to_string(),
            CacheEntry {
                data,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    fn record_success(&self, level_id: &str, latency: Duration) {
        let window = self.config.latency_window.max(1);
        let mut state = self.metrics.lock();

        state.metrics.fallback_successes += 1;
        *state
            .metrics
            .fallback_successes_by_level
            .entry(level_id.to_string())
            .or_insert(0) += 1;

        state.latencies.push_back(latency);
        while state.latencies.len() > window {
            state.latencies.pop_front();
        }
        let total: Duration = state.latencies.iter().sum();
        state.metrics.average_fallback_latency_ms =
            total.as_secs_f64() * 1000.0 / state.latencies.len() as f64;
    }

    pub fn metrics(&self) -> FallbackMetrics {
        self.metrics.lock().metrics.clone()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn reset_metrics(&self) {
        *self.metrics.lock() = MetricsState::default();
    }
}
