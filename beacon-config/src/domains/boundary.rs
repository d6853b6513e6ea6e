//! Error boundary configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};

/// Error boundary configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ErrorBoundaryConfig {
    /// Maximum number of error history entries kept; the oldest are evicted
    pub history_limit: usize,
}

impl Default for ErrorBoundaryConfig {
    fn default() -> Self {
        Self { history_limit: 100 }
    }
}

impl Validatable for ErrorBoundaryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.history_limit, "history_limit", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "error_boundary"
    }
}
