//! Ordered fallback chains
//!
//! A [`FallbackStrategy`] holds the substitute operations (or static data)
//! registered for one logical operation, tried in ascending priority order
//! when the primary fails. [`FallbackManager`] keys strategies by
//! operation name.

mod manager;
mod strategy;

pub use manager::FallbackManager;
pub use strategy::FallbackStrategy;

use beacon_config::FallbackTrigger;
use beacon_core::{BeaconError, MetadataValue, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Where a level's substitute value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackDataType {
    Static,
    /// Results are cached per level for the level's TTL
    Cached,
    Default,
    Computed,
    External,
}

type ConditionFn = Arc<dyn Fn(&BeaconError) -> bool + Send + Sync>;

/// When a fallback chain, or one level of it, applies
#[derive(Clone)]
pub enum FallbackCondition {
    Always,
    OnError,
    OnTimeout,
    OnNetworkError,
    OnDataError,
    Custom(ConditionFn),
}

impl FallbackCondition {
    pub fn custom<P>(predicate: P) -> Self
    where
        P: Fn(&BeaconError) -> bool + Send + Sync + 'static,
    {
        FallbackCondition::Custom(Arc::new(predicate))
    }

    /// Whether `error` satisfies this condition.
    ///
    /// The typed conditions look at the error name and message directly,
    /// each independently of the others, so a timeout mentioning a fetch
    /// still counts as a timeout.
    pub fn matches(&self, error: &BeaconError) -> bool {
        match self {
            FallbackCondition::Always | FallbackCondition::OnError => true,
            FallbackCondition::OnTimeout => mentions(error, TIMEOUT_HINTS),
            FallbackCondition::OnNetworkError => mentions(error, NETWORK_HINTS),
            FallbackCondition::OnDataError => {
                matches!(error, BeaconError::Serialization(_)) || mentions(error, DATA_HINTS)
            }
            FallbackCondition::Custom(predicate) => predicate(error),
        }
    }
}

const TIMEOUT_HINTS: &[&str] = &["timeout", "timed out"];
const NETWORK_HINTS: &[&str] = &["network", "fetch"];
const DATA_HINTS: &[&str] = &["json", "parse", "invalid", "format"];

fn mentions(error: &BeaconError, hints: &[&str]) -> bool {
    let text = format!("{} {}", error.name(), error.message()).to_lowercase();
    hints.iter().any(|hint| text.contains(hint))
}

impl From<FallbackTrigger> for FallbackCondition {
    fn from(trigger: FallbackTrigger) -> Self {
        match trigger {
            FallbackTrigger::Always => FallbackCondition::Always,
            FallbackTrigger::OnError => FallbackCondition::OnError,
            FallbackTrigger::OnTimeout => FallbackCondition::OnTimeout,
            FallbackTrigger::OnNetworkError => FallbackCondition::OnNetworkError,
            FallbackTrigger::OnDataError => FallbackCondition::OnDataError,
        }
    }
}

impl std::fmt::Debug for FallbackCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackCondition::Always => write!(f, "Always"),
            FallbackCondition::OnError => write!(f, "OnError"),
            FallbackCondition::OnTimeout => write!(f, "OnTimeout"),
            FallbackCondition::OnNetworkError => write!(f, "OnNetworkError"),
            FallbackCondition::OnDataError => write!(f, "OnDataError"),
            FallbackCondition::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Substitute operation, handed the primary error and the call options
pub type FallbackOperation<T> =
    Arc<dyn Fn(&BeaconError, &FallbackOptions) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Value source of a level
#[derive(Clone)]
pub enum FallbackSource<T> {
    Operation(FallbackOperation<T>),
    Data(T),
}

/// One substitute in a fallback chain
#[derive(Clone)]
pub struct FallbackLevel<T> {
    pub id: String,
    pub name: String,
    pub source: FallbackSource<T>,
    pub data_type: FallbackDataType,
    pub condition: FallbackCondition,
    /// Lower runs first
    pub priority: i32,
    pub enabled: bool,
    /// Cache TTL for CACHED levels; the strategy default applies when unset
    pub cache_ttl: Option<Duration>,
}

impl<T> FallbackLevel<T> {
    /// Level returning a fixed value
    pub fn from_data(id: impl Into<String>, name: impl Into<String>, data: T) -> Self {
        Self::with_source(id, name, FallbackSource::Data(data), FallbackDataType::Static)
    }

    /// Level computing its value from the primary error
    pub fn from_operation<F, Fut>(id: impl Into<String>, name: impl Into<String>, operation: F) -> Self
    where
        F: Fn(&BeaconError, &FallbackOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let operation: FallbackOperation<T> =
            Arc::new(move |error: &BeaconError, options: &FallbackOptions| -> BoxFuture<'static, Result<T>> {
                Box::pin(operation(error, options))
            });
        Self::with_source(id, name, FallbackSource::Operation(operation), FallbackDataType::Computed)
    }

    fn with_source(
        id: impl Into<String>,
        name: impl Into<String>,
        source: FallbackSource<T>,
        data_type: FallbackDataType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source,
            data_type,
            condition: FallbackCondition::Always,
            priority: 0,
            enabled: true,
            cache_ttl: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_condition(mut self, condition: FallbackCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_data_type(mut self, data_type: FallbackDataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Mark the level CACHED with the given TTL
    pub fn cached(mut self, ttl: Duration) -> Self {
        self.data_type = FallbackDataType::Cached;
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl<T> std::fmt::Debug for FallbackLevel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.source {
            FallbackSource::Operation(_) => "operation",
            FallbackSource::Data(_) => "data",
        };
        f.debug_struct("FallbackLevel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("source", &source)
            .field("data_type", &self.data_type)
            .field("condition", &self.condition)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct FallbackOptions {
    /// Overrides the strategy's operation-level condition for this call
    pub condition: Option<FallbackCondition>,
    /// Ignore cached values for this call
    pub skip_cache: bool,
    /// Free-form values available to fallback operations
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl FallbackOptions {
    pub fn with_condition(condition: FallbackCondition) -> Self {
        Self {
            condition: Some(condition),
            ..Default::default()
        }
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Metrics for one fallback strategy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackMetrics {
    pub total_attempts: u64,
    pub primary_successes: u64,
    pub fallback_successes: u64,
    pub fallback_successes_by_level: BTreeMap<String, u64>,
    pub fallback_failures_by_level: BTreeMap<String, u64>,
    pub cache_hits: u64,
    pub total_failures: u64,
    /// Rolling average over the most recent fallback latencies
    pub average_fallback_latency_ms: f64,
}

impl FallbackMetrics {
    /// Share of attempts that produced a value (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            1.0
        } else {
            (self.primary_successes + self.fallback_successes) as f64 / self.total_attempts as f64
        }
    }
}
