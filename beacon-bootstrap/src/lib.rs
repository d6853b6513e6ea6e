//! Phased bootstrap for Beacon
//!
//! Runs an ordered list of named initialisation phases, each under its own
//! recovery policy. Optional phases that cannot be recovered put the
//! application into degraded mode instead of aborting startup.

pub mod degraded;
pub mod error;
pub mod orchestrator;
pub mod phase;
pub mod runtime;

pub use degraded::{DegradedMode, DegradedModeInfo, DegradedModeProbe};
pub use error::BootstrapError;
pub use orchestrator::{Bootstrap, BootstrapBuilder, BootstrapReport};
pub use phase::{PhaseContext, PhaseDescriptor, PhaseFn, PhaseOptions, PhaseOutcome};
pub use runtime::BeaconRuntime;

/// State store keys written during bootstrap
pub mod keys {
    pub const DEGRADED_MODE: &str = "app.degraded_mode";
    pub const DEGRADED_MODE_INFO: &str = "app.degraded_mode_info";
    pub const BOOTSTRAP_STATUS: &str = "bootstrap.status";

    /// Status key of one phase
    pub fn phase_status(phase: &str) -> String {
        format!("bootstrap.phase.{}", phase)
    }
}
