//! Phase descriptors and per-phase policy

use beacon_config::BootstrapConfig;
use beacon_core::{EventBus, Result, ServiceRegistry, StateStore};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Recovery policy of one phase
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOptions {
    /// Re-run the phase after a failure
    pub allow_recovery: bool,
    /// Continue in degraded mode when the phase cannot be recovered
    pub allow_degradation: bool,
    /// Re-runs after the first failure when recovery is allowed
    pub max_retries: u32,
    /// Never degrade, whatever `allow_degradation` says
    pub required: bool,
    /// Pause between re-runs
    pub recovery_delay: Duration,
}

impl Default for PhaseOptions {
    fn default() -> Self {
        Self::from_config(&BootstrapConfig::default())
    }
}

impl PhaseOptions {
    /// Recoverable, non-degradable phase with the configured retry budget
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self {
            allow_recovery: true,
            allow_degradation: false,
            max_retries: config.default_max_retries,
            required: false,
            recovery_delay: config.recovery_delay,
        }
    }

    /// Phase whose failure aborts startup
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Phase whose failure degrades the application
    pub fn optional() -> Self {
        Self {
            allow_degradation: true,
            ..Default::default()
        }
    }

    pub fn allow_recovery(mut self, allow: bool) -> Self {
        self.allow_recovery = allow;
        self
    }

    pub fn allow_degradation(mut self, allow: bool) -> Self {
        self.allow_degradation = allow;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn recovery_delay(mut self, delay: Duration) -> Self {
        self.recovery_delay = delay;
        self
    }

    /// Runs of the phase function before giving up
    pub fn max_attempts(&self) -> u32 {
        if self.allow_recovery {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }

    pub fn can_degrade(&self) -> bool {
        self.allow_degradation && !self.required
    }
}

/// Collaborators handed to a phase function
#[derive(Clone)]
pub struct PhaseContext {
    pub phase: String,
    /// 1-based run number of the phase
    pub attempt: u32,
    pub services: Arc<ServiceRegistry>,
    pub state: Arc<dyn StateStore>,
    pub events: Arc<dyn EventBus>,
}

pub type PhaseFn = Arc<dyn Fn(PhaseContext) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A named phase and its policy
#[derive(Clone)]
pub struct PhaseDescriptor {
    pub name: String,
    pub options: PhaseOptions,
    pub run: PhaseFn,
}

impl PhaseDescriptor {
    pub fn new<F, Fut>(name: impl Into<String>, options: PhaseOptions, run: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let run: PhaseFn = Arc::new(move |context: PhaseContext| -> BoxFuture<'static, Result<()>> {
            Box::pin(run(context))
        });
        Self {
            name: name.into(),
            options,
            run,
        }
    }
}

impl std::fmt::Debug for PhaseDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseDescriptor")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

/// How a phase finished without aborting the bootstrap
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    /// Succeeded on the first run
    Completed,
    /// Succeeded after `attempts` runs
    Recovered { attempts: u32 },
    /// Every run failed but a registered fallback stood in for the phase
    FellBack { attempts: u32 },
    /// Gave up after `attempts` runs and continued degraded
    Degraded { attempts: u32, error: String },
}

impl PhaseOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, PhaseOutcome::Degraded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_budget() {
        assert_eq!(PhaseOptions::default().max_attempts(), 3);
        assert_eq!(PhaseOptions::default().max_retries(1).max_attempts(), 2);
        assert_eq!(PhaseOptions::default().allow_recovery(false).max_attempts(), 1);
    }

    #[test]
    fn test_required_overrides_degradation() {
        assert!(PhaseOptions::optional().can_degrade());
        assert!(!PhaseOptions::default().can_degrade());
        assert!(!PhaseOptions::required().allow_degradation(true).can_degrade());
    }

    #[test]
    fn test_options_follow_config() {
        let options = PhaseOptions::from_config(&BootstrapConfig {
            default_max_retries: 5,
            recovery_delay: Duration::from_secs(1),
        });
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.recovery_delay, Duration::from_secs(1));
        assert!(options.allow_recovery);
    }
}
