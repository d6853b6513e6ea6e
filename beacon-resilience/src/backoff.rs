//! Exponential backoff for retry delays

use beacon_config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Share of the delay used as symmetric jitter (±20%)
const JITTER_RATIO: f64 = 0.2;

/// Backoff delay calculator
///
/// `delay(n) = min(base_delay * multiplier^(n-1), max_delay)`, optionally
/// with symmetric jitter applied to the capped value.
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl BackoffCalculator {
    pub fn new(base_delay: Duration, max_delay: Duration, multiplier: f64, jitter: bool) -> Self {
        Self {
            base_delay,
            max_delay,
            multiplier,
            jitter,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.base_delay,
            config.max_delay,
            config.backoff_multiplier,
            config.jitter,
        )
    }

    /// Calculate delay for a specific attempt (1-indexed)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let capped_delay = self.ceiling(attempt);

        if self.jitter {
            self.add_jitter(capped_delay)
        } else {
            capped_delay
        }
    }

    /// Deterministic delay for an attempt, before jitter
    pub fn ceiling(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let nanos = self.base_delay.as_nanos() as f64 * self.multiplier.powi(exponent);
        let max_nanos = self.max_delay.as_nanos() as f64;

        if !nanos.is_finite() || nanos >= max_nanos {
            self.max_delay
        } else {
            Duration::from_nanos(nanos as u64)
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let jitter_factor = rng.gen_range((1.0 - JITTER_RATIO)..(1.0 + JITTER_RATIO));
        Duration::from_nanos((delay.as_nanos() as f64 * jitter_factor) as u64)
    }
}
