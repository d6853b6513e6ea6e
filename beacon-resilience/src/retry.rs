//! Bounded retry with exponential backoff

use beacon_config::RetryConfig;
use beacon_core::{BeaconError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backoff::BackoffCalculator;

type RetryCondition = Arc<dyn Fn(&BeaconError) -> bool + Send + Sync>;

/// Retry executor.
///
/// Stateless across calls: the attempt counter lives inside a single
/// `execute` invocation, so one strategy can be shared by every caller of
/// a component.
#[derive(Clone)]
pub struct RetryStrategy {
    config: RetryConfig,
    backoff: BackoffCalculator,
    retry_condition: Option<RetryCondition>,
}

impl RetryStrategy {
    pub fn new(config: RetryConfig) -> Self {
        let backoff = BackoffCalculator::from_config(&config);
        Self {
            config,
            backoff,
            retry_condition: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Stop retrying as soon as an error fails `condition`
    pub fn with_retry_condition<C>(mut self, condition: C) -> Self
    where
        C: Fn(&BeaconError) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Some(Arc::new(condition));
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// First attempt plus `max_retries`
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt` (1-indexed), jitter included
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.backoff.calculate_delay(attempt)
    }

    /// Deterministic delay before retry number `attempt`
    pub fn delay_ceiling(&self, attempt: u32) -> Duration {
        self.backoff.ceiling(attempt)
    }

    /// Execute a function with retry logic
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_context(label, |_attempt| operation()).await
    }

    /// Execute a function with retry logic and attempt context.
    ///
    /// On exhaustion the error of the last attempt is returned.
    pub async fn execute_with_context<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            debug!(operation = label, attempt, max_attempts, "Executing attempt");

            match operation(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(operation = label, attempts = attempt, "Operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if attempt >= max_attempts {
                        warn!(operation = label, attempts = attempt, %error, "Retries exhausted");
                        return Err(error);
                    }

                    if let Some(condition) = &self.retry_condition {
                        if !condition(&error) {
                            warn!(operation = label, attempts = attempt, %error, "Error is not retryable");
                            return Err(error);
                        }
                    }

                    let delay = self.calculate_delay(attempt);
                    warn!(
                        operation = label,
                        attempt,
                        %error,
                        delay_ms = delay.as_millis() as u64,
                        "Attempt failed, retrying"
                    );
                    sleep(delay).await;

                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for RetryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryStrategy")
            .field("config", &self.config)
            .field("has_retry_condition", &self.retry_condition.is_some())
            .finish()
    }
}
