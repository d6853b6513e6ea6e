//! Structured logging infrastructure for Beacon
//!
//! Every Beacon crate logs through `tracing`; this crate installs the
//! global subscriber from [`LoggingConfig`].

pub mod init;

pub use beacon_config::{LogFormat, LogLevel, LoggingConfig};
pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
