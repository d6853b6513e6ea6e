//! Core domain types for the Beacon resilience core
//!
//! This crate holds the error taxonomy shared by every other Beacon crate:
//! the error type, the immutable error context, the classifier that maps
//! an error onto a recovery strategy, and the narrow collaborator contracts
//! (event bus, state store, service locator) the resilience machinery is
//! handed at construction time.

pub mod classification;
pub mod context;
pub mod error;
pub mod events;
pub mod service;
pub mod state;

// Re-export commonly used types at the crate root
pub use classification::{ErrorClassification, ErrorClassifier, ErrorType, RecoveryStrategy, Severity};
pub use context::{ErrorContext, ErrorContextBuilder, MetadataValue};
pub use error::{BeaconError, Result, RuntimeFault};
pub use events::{BroadcastEventBus, EventBus, LifecycleEvent};
pub use service::ServiceRegistry;
pub use state::{InMemoryStateStore, StateStore};
