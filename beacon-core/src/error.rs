//! Core error type for Beacon

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised by an operation guarded by the resilience core.
///
/// The variants mirror the error "names" the classifier keys on. Anything
/// without a more specific shape is `Other`, and is classified purely by its
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BeaconError {
    /// Network/transport failure
    #[error("{0}")]
    Network(String),

    /// Operation exceeded its deadline
    #[error("{0}")]
    Timeout(String),

    /// Programming fault surfaced at runtime (a bug, not an environmental condition)
    #[error("{fault}: {message}")]
    Runtime { fault: RuntimeFault, message: String },

    /// Call rejected by an open circuit breaker
    #[error("Circuit breaker is OPEN for '{component}'")]
    CircuitOpen { component: String },

    /// Serialization/deserialization of a result payload failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Named collaborator lookup failed
    #[error("Service error: {0}")]
    Service(String),

    /// Generic error carrying only a message
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Beacon
pub type Result<T> = std::result::Result<T, BeaconError>;

/// Kind of programming fault carried by [`BeaconError::Runtime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeFault {
    /// Use of an undefined binding or missing collaborator
    Reference,
    /// Value used with the wrong shape
    Type,
}

impl std::fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeFault::Reference => write!(f, "ReferenceError"),
            RuntimeFault::Type => write!(f, "TypeError"),
        }
    }
}

impl BeaconError {
    pub fn network(message: impl Into<String>) -> Self {
        BeaconError::Network(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        BeaconError::Timeout(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        BeaconError::Other(message.into())
    }

    pub fn reference(message: impl Into<String>) -> Self {
        BeaconError::Runtime {
            fault: RuntimeFault::Reference,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        BeaconError::Runtime {
            fault: RuntimeFault::Type,
            message: message.into(),
        }
    }

    /// Error name used for pattern matching and reporting
    pub fn name(&self) -> &'static str {
        match self {
            BeaconError::Network(_) => "NetworkError",
            BeaconError::Timeout(_) => "TimeoutError",
            BeaconError::Runtime { fault: RuntimeFault::Reference, .. } => "ReferenceError",
            BeaconError::Runtime { fault: RuntimeFault::Type, .. } => "TypeError",
            BeaconError::CircuitOpen { .. } => "CircuitBreakerOpenError",
            BeaconError::Serialization(_) => "SerializationError",
            BeaconError::Service(_) => "ServiceError",
            BeaconError::Other(_) => "Error",
        }
    }

    /// Bare message, without the name prefix some variants display
    pub fn message(&self) -> String {
        match self {
            BeaconError::Runtime { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Check if this error is a circuit breaker rejection
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, BeaconError::CircuitOpen { .. })
    }
}

impl From<serde_json::Error> for BeaconError {
    fn from(err: serde_json::Error) -> Self {
        BeaconError::Serialization(err.to_string())
    }
}
