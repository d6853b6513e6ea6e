//! Bootstrap error types

use beacon_config::ConfigError;
use beacon_core::BeaconError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    /// A phase that may not degrade failed; remaining phases were not run
    #[error("Bootstrap failed in phase '{phase}': {source}")]
    Fatal {
        phase: String,
        #[source]
        source: BeaconError,
    },

    #[error("Bootstrap has already been initialized")]
    AlreadyInitialized,

    #[error("No bootstrap phases declared")]
    NoPhases,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BootstrapError {
    /// Phase that aborted the bootstrap, if any
    pub fn phase(&self) -> Option<&str> {
        match self {
            BootstrapError::Fatal { phase, .. } => Some(phase),
            _ => None,
        }
    }
}
