//! Lifecycle events and the event bus contract

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle event announced by the resilience core.
///
/// UI components subscribe to these to show degraded-mode notices or a
/// blocking startup error; the core itself never renders anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    CircuitOpened {
        component: String,
        failure_count: u32,
    },
    CircuitClosed {
        component: String,
    },
    ComponentDegraded {
        component: String,
        operation: String,
        error: String,
    },
    PhaseStarted {
        phase: String,
    },
    PhaseCompleted {
        phase: String,
        attempts: u32,
    },
    DegradedModeEntered {
        phase: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    BootstrapCompleted {
        degraded: bool,
        elapsed_ms: u64,
    },
    BootstrapFailed {
        phase: String,
        error: String,
    },
    HealthChanged {
        previous: String,
        current: String,
    },
}

impl LifecycleEvent {
    /// Stable event name, matching the serde tag
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::CircuitOpened { .. } => "circuit_opened",
            LifecycleEvent::CircuitClosed { .. } => "circuit_closed",
            LifecycleEvent::ComponentDegraded { .. } => "component_degraded",
            LifecycleEvent::PhaseStarted { .. } => "phase_started",
            LifecycleEvent::PhaseCompleted { .. } => "phase_completed",
            LifecycleEvent::DegradedModeEntered { .. } => "degraded_mode_entered",
            LifecycleEvent::BootstrapCompleted { .. } => "bootstrap_completed",
            LifecycleEvent::BootstrapFailed { .. } => "bootstrap_failed",
            LifecycleEvent::HealthChanged { .. } => "health_changed",
        }
    }
}

/// Publish/subscribe surface for lifecycle events
pub trait EventBus: Send + Sync {
    /// Announce an event; delivery is best-effort
    fn emit(&self, event: LifecycleEvent);

    /// Subscribe to all subsequent events
    fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent>;
}

/// Event bus backed by a tokio broadcast channel
pub struct BroadcastEventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastEventBus {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for BroadcastEventBus {
    fn emit(&self, event: LifecycleEvent) {
        tracing::debug!(event = event.name(), "Emitting lifecycle event");
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}
