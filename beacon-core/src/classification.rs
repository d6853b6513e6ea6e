//! Error classification
//!
//! Maps a raised error onto the taxonomy every other component uses to
//! decide what to do with it. The rule table below is the single source of
//! truth; precedence matters (first match wins).

use serde::{Deserialize, Serialize};

use crate::context::ErrorContext;
use crate::error::BeaconError;

/// Error type in the taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    Network,
    Timeout,
    Validation,
    Permission,
    Data,
    Runtime,
    Unknown,
}

impl ErrorType {
    /// Default recovery strategy for this error type
    pub fn default_strategy(&self) -> RecoveryStrategy {
        match self {
            ErrorType::Network | ErrorType::Timeout | ErrorType::Unknown => RecoveryStrategy::Retry,
            ErrorType::Validation | ErrorType::Data => RecoveryStrategy::Fallback,
            ErrorType::Permission => RecoveryStrategy::Degrade,
            ErrorType::Runtime => RecoveryStrategy::Fail,
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorType::Network | ErrorType::Timeout | ErrorType::Data | ErrorType::Unknown => {
                Severity::Medium
            }
            ErrorType::Validation | ErrorType::Permission => Severity::High,
            ErrorType::Runtime => Severity::Critical,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorType::Network | ErrorType::Timeout | ErrorType::Data | ErrorType::Unknown
        )
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorType::Network => "NETWORK",
            ErrorType::Timeout => "TIMEOUT",
            ErrorType::Validation => "VALIDATION",
            ErrorType::Permission => "PERMISSION",
            ErrorType::Data => "DATA",
            ErrorType::Runtime => "RUNTIME",
            ErrorType::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// Error severity, used for reporting weight only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn should_alert(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }

    /// Log level this severity is reported at
    pub fn log_level(&self) -> tracing::Level {
        match self {
            Severity::Low => tracing::Level::DEBUG,
            Severity::Medium | Severity::High => tracing::Level::WARN,
            Severity::Critical => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// What the error boundary should do with a classified error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStrategy {
    Retry,
    Fallback,
    Degrade,
    Fail,
}

impl std::fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryStrategy::Retry => write!(f, "RETRY"),
            RecoveryStrategy::Fallback => write!(f, "FALLBACK"),
            RecoveryStrategy::Degrade => write!(f, "DEGRADE"),
            RecoveryStrategy::Fail => write!(f, "FAIL"),
        }
    }
}

/// Result of classifying one error occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub error_type: ErrorType,
    pub severity: Severity,
    pub strategy: RecoveryStrategy,
    pub retryable: bool,
}

impl ErrorClassification {
    /// Classification carrying the defaults for `error_type`
    pub fn for_type(error_type: ErrorType) -> Self {
        Self {
            error_type,
            severity: error_type.default_severity(),
            strategy: error_type.default_strategy(),
            retryable: error_type.is_retryable(),
        }
    }
}

const NETWORK_PATTERNS: &[&str] = &["network", "fetch"];
const TIMEOUT_PATTERNS: &[&str] = &["timeout", "timed out"];
const VALIDATION_PATTERNS: &[&str] = &["invalid", "format"];
const PERMISSION_PATTERNS: &[&str] = &["permission", "denied", "unauthorized", "forbidden", "access"];
const DATA_PATTERNS: &[&str] = &["json", "parse"];

/// Stateless error classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify an error. Pure: the same error always yields the same result.
    pub fn classify(&self, error: &BeaconError, _context: &ErrorContext) -> ErrorClassification {
        ErrorClassification::for_type(Self::error_type_of(error))
    }

    /// Taxonomy type of an error, independent of any context
    pub fn error_type_of(error: &BeaconError) -> ErrorType {
        let message = error.message().to_lowercase();
        let contains_any = |patterns: &[&str]| patterns.iter().any(|p| message.contains(p));

        if matches!(error, BeaconError::Network(_)) || contains_any(NETWORK_PATTERNS) {
            ErrorType::Network
        } else if matches!(error, BeaconError::Timeout(_)) || contains_any(TIMEOUT_PATTERNS) {
            ErrorType::Timeout
        } else if contains_any(VALIDATION_PATTERNS) && !contains_any(DATA_PATTERNS) {
            ErrorType::Validation
        } else if contains_any(PERMISSION_PATTERNS) {
            ErrorType::Permission
        } else if contains_any(DATA_PATTERNS) {
            ErrorType::Data
        } else if matches!(error, BeaconError::Runtime { .. }) {
            ErrorType::Runtime
        } else {
            ErrorType::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(error: BeaconError) -> ErrorClassification {
        ErrorClassifier::new().classify(&error, &ErrorContext::new("test", "classify"))
    }

    #[test]
    fn test_network_classification() {
        let c = classify(BeaconError::other("network request failed"));
        assert_eq!(c.error_type, ErrorType::Network);
        assert_eq!(c.severity, Severity::Medium);
        assert_eq!(c.strategy, RecoveryStrategy::Retry);
        assert!(c.retryable);

        assert_eq!(classify(BeaconError::other("Failed to fetch")).error_type, ErrorType::Network);
        assert_eq!(classify(BeaconError::network("socket closed")).error_type, ErrorType::Network);
    }

    #[test]
    fn test_timeout_classification() {
        let c = classify(BeaconError::other("Request timeout after 5000ms"));
        assert_eq!(c.error_type, ErrorType::Timeout);
        assert_eq!(c.strategy, RecoveryStrategy::Retry);
        assert!(c.retryable);
        assert_eq!(classify(BeaconError::timeout("deadline")).error_type, ErrorType::Timeout);
    }

    #[test]
    fn test_validation_versus_data() {
        let c = classify(BeaconError::other("Invalid coordinate format"));
        assert_eq!(c.error_type, ErrorType::Validation);
        assert_eq!(c.severity, Severity::High);
        assert_eq!(c.strategy, RecoveryStrategy::Fallback);
        assert!(!c.retryable);

        // A JSON qualifier turns an "invalid" message into a data error
        let c = classify(BeaconError::other("Invalid JSON in boundary file"));
        assert_eq!(c.error_type, ErrorType::Data);
        assert_eq!(c.severity, Severity::Medium);
        assert_eq!(c.strategy, RecoveryStrategy::Fallback);
        assert!(c.retryable);
    }

    #[test]
    fn test_permission_classification() {
        let c = classify(BeaconError::other("Geolocation permission denied"));
        assert_eq!(c.error_type, ErrorType::Permission);
        assert_eq!(c.severity, Severity::High);
        assert_eq!(c.strategy, RecoveryStrategy::Degrade);
        assert!(!c.retryable);
    }

    #[test]
    fn test_runtime_classification() {
        let c = classify(BeaconError::type_error("layer.setStyle is not a function"));
        assert_eq!(c.error_type, ErrorType::Runtime);
        assert_eq!(c.severity, Severity::Critical);
        assert_eq!(c.strategy, RecoveryStrategy::Fail);
        assert!(!c.retryable);

        // Message patterns take precedence over the runtime fault kind
        let c = classify(BeaconError::type_error("NetworkError when attempting to fetch resource"));
        assert_eq!(c.error_type, ErrorType::Network);
    }

    #[test]
    fn test_unknown_classification() {
        let c = classify(BeaconError::other("something odd happened"));
        assert_eq!(c.error_type, ErrorType::Unknown);
        assert_eq!(c.severity, Severity::Medium);
        assert_eq!(c.strategy, RecoveryStrategy::Retry);
        assert!(c.retryable);
    }

    #[test]
    fn test_precedence_network_before_timeout() {
        let c = classify(BeaconError::other("network timeout"));
        assert_eq!(c.error_type, ErrorType::Network);
    }

    #[test]
    fn test_severity_alerting_and_levels() {
        assert!(!Severity::Low.should_alert());
        assert!(!Severity::Medium.should_alert());
        assert!(Severity::High.should_alert());
        assert!(Severity::Critical.should_alert());
        assert_eq!(Severity::High.log_level(), tracing::Level::WARN);
        assert_eq!(Severity::Critical.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let error = BeaconError::other("failed to parse response");
        let first = classify(error.clone());
        for _ in 0..10 {
            assert_eq!(classify(error.clone()), first);
        }
    }
}
