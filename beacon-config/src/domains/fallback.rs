//! Fallback chain configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_duration, validate_positive, Validatable};

/// Condition under which a fallback chain (or a single level) engages.
///
/// Custom predicates cannot be expressed in configuration; they are
/// attached in code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTrigger {
    Always,
    #[default]
    OnError,
    OnTimeout,
    OnNetworkError,
    OnDataError,
}

/// Defaults for every fallback strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FallbackConfig {
    /// Disabled strategies rethrow the primary error untouched
    pub enabled: bool,

    /// Operation-level condition
    pub condition: FallbackTrigger,

    /// Cache results produced by CACHED levels
    pub cache_fallback_data: bool,

    /// TTL for cached fallback results when a level sets none
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Number of latency samples kept for the rolling average
    pub latency_window: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            condition: FallbackTrigger::OnError,
            cache_fallback_data: true,
            cache_ttl: Duration::from_secs(300),
            latency_window: 100,
        }
    }
}

impl FallbackConfig {
    /// Apply per-operation overrides on top of these defaults
    pub fn merge(&self, overrides: &FallbackOverrides) -> FallbackConfig {
        FallbackConfig {
            enabled: overrides.enabled.unwrap_or(self.enabled),
            condition: overrides.condition.unwrap_or(self.condition),
            cache_fallback_data: overrides
                .cache_fallback_data
                .unwrap_or(self.cache_fallback_data),
            cache_ttl: overrides.cache_ttl.unwrap_or(self.cache_ttl),
            latency_window: overrides.latency_window.unwrap_or(self.latency_window),
        }
    }
}

/// Per-operation overrides merged onto [`FallbackConfig`]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FallbackOverrides {
    pub enabled: Option<bool>,
    pub condition: Option<FallbackTrigger>,
    pub cache_fallback_data: Option<bool>,
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Option<Duration>,
    pub latency_window: Option<usize>,
}

impl Validatable for FallbackConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_duration(self.cache_ttl, "cache_ttl", self.domain_name())?;
        validate_positive(self.latency_window, "latency_window", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "fallback"
    }
}
