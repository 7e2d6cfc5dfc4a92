//! Lifecycle event bus
//!
//! Every status transition is broadcast so operators (health endpoints,
//! audit sinks, tests) can observe the runtime without polling.

use notifyr_domain::build::{BuildOutcome, BuildToken};
use notifyr_domain::status::ComponentStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Something that happened to a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A build pass finished
    Built {
        component: String,
        token: BuildToken,
        outcome: BuildOutcome,
        previous: ComponentStatus,
        status: ComponentStatus,
    },
    /// The component was destroyed
    Destroyed { component: String },
    /// The status was assigned directly (remote state change, rotation)
    StatusChanged {
        component: String,
        previous: ComponentStatus,
        status: ComponentStatus,
    },
    /// A fresh credential was installed
    CredentialRotated { component: String, attempts: u32 },
    /// Rotation gave up, the old credential stays in place
    RotationExhausted { component: String, attempts: u32 },
}

impl LifecycleEvent {
    /// Name of the component the event is about
    pub fn component(&self) -> &str {
        match self {
            Self::Built { component, .. }
            | Self::Destroyed { component }
            | Self::StatusChanged { component, .. }
            | Self::CredentialRotated { component, .. }
            | Self::RotationExhausted { component, .. } => component,
        }
    }
}

/// Broadcast channel for lifecycle events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; having no subscriber is not an error
    pub fn publish(&self, event: LifecycleEvent) {
        if self.sender.send(event).is_err() {
            trace!("Lifecycle event dropped, no subscribers");
        }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::constants::EVENT_BUS_CAPACITY)
    }
}
