//! Configuration loading and environment variable handling

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::BeaconConfig;
use crate::error::{ConfigError, ConfigResult};

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "BEACON".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<BeaconConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: BeaconConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<BeaconConfig> {
        let mut config = BeaconConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<BeaconConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut BeaconConfig) -> ConfigResult<()> {
        if let Some(level) = self.parse_env("LOG_LEVEL")? {
            config.logging.level = level;
        }
        if let Some(format) = self.parse_env("LOG_FORMAT")? {
            config.logging.format = format;
        }

        if let Some(threshold) = self.parse_env("CB_FAILURE_THRESHOLD")? {
            config.circuit_breaker.failure_threshold = threshold;
        }
        if let Some(ms) = self.parse_env::<u64>("CB_RESET_TIMEOUT_MS")? {
            config.circuit_breaker.reset_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.parse_env::<u64>("CB_CALL_TIMEOUT_MS")? {
            // 0 disables per-call deadlines
            config.circuit_breaker.timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        if let Some(retries) = self.parse_env("RETRY_MAX_RETRIES")? {
            config.retry.max_retries = retries;
        }
        if let Some(ms) = self.parse_env::<u64>("RETRY_BASE_DELAY_MS")? {
            config.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.parse_env::<u64>("RETRY_MAX_DELAY_MS")? {
            config.retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(jitter) = self.parse_env("RETRY_JITTER")? {
            config.retry.jitter = jitter;
        }

        if let Some(secs) = self.parse_env::<u64>("FALLBACK_CACHE_TTL_SECS")? {
            config.fallback.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.parse_env::<u64>("HEALTH_INTERVAL_SECS")? {
            config.health.interval = Duration::from_secs(secs);
        }
        if let Some(limit) = self.parse_env("ERROR_HISTORY_LIMIT")? {
            config.error_boundary.history_limit = limit;
        }

        Ok(())
    }

    /// Read and parse a prefixed environment variable, if set
    fn parse_env<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                ConfigError::EnvError(format!("Invalid {}_{}: {}", self.prefix, name, e))
            }),
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
