//! Fallback strategies keyed by operation name

use beacon_config::{FallbackConfig, FallbackOverrides};
use beacon_core::{BeaconError, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use super::{FallbackLevel, FallbackMetrics, FallbackOptions, FallbackStrategy};

/// Registry of fallback strategies keyed by operation name.
///
/// Strategies are created on first use with the manager's defaults.
pub struct FallbackManager<T> {
    defaults: FallbackConfig,
    strategies: RwLock<HashMap<String, Arc<FallbackStrategy<T>>>>,
}

impl<T> FallbackManager<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(defaults: FallbackConfig) -> Self {
        Self {
            defaults,
            strategies: RwLock::new(HashMap::new()),
        }
    }

    pub fn defaults(&self) -> &FallbackConfig {
        &self.defaults
    }

    /// Get or create the strategy for `key`
    pub fn get_strategy(&self, key: &str) -> Arc<FallbackStrategy<T>> {
        self.get_strategy_with(key, &FallbackOverrides::default())
    }

    /// Get or create the strategy for `key`; overrides only apply on creation
    pub fn get_strategy_with(&self, key: &str, overrides: &FallbackOverrides) -> Arc<FallbackStrategy<T>> {
        if let Some(strategy) = self.strategies.read().get(key) {
            return strategy.clone();
        }

        self.strategies
            .write()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(FallbackStrategy::new(key, self.defaults.merge(overrides))))
            .clone()
    }

    /// Install a fully configured strategy, replacing any existing one
    pub fn insert_strategy(&self, strategy: FallbackStrategy<T>) -> Arc<FallbackStrategy<T>> {
        let strategy = Arc::new(strategy);
        self.strategies
            .write()
            .insert(strategy.name().to_string(), strategy.clone());
        strategy
    }

    pub fn register_level(&self, key: &str, level: FallbackLevel<T>) {
        self.get_strategy(key).add_level(level);
    }

    /// Whether `key` has a strategy with at least one level
    pub fn has_strategy(&self, key: &str) -> bool {
        self.strategies
            .read()
            .get(key)
            .is_some_and(|strategy| strategy.level_count() > 0)
    }

    pub async fn execute<F, Fut>(&self, key: &str, primary: F, options: &FallbackOptions) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let strategy = self.get_strategy(key);
        strategy.execute(primary, options).await
    }

    pub async fn recover(&self, key: &str, error: BeaconError, options: &FallbackOptions) -> Result<T> {
        let strategy = self.get_strategy(key);
        strategy.recover(error, options).await
    }

    pub fn get_all_metrics(&self) -> BTreeMap<String, FallbackMetrics> {
        self.strategies
            .read()
            .iter()
            .map(|(key, strategy)| (key.clone(), strategy.metrics()))
            .collect()
    }

    pub fn clear_caches(&self) {
        for strategy in self.strategies.read().values() {
            strategy.clear_cache();
        }
    }
}

impl<T> Default for FallbackManager<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(FallbackConfig::default())
    }
}
