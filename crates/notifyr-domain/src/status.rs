//! Component status model
//!
//! The externally observable health of a component and the lifecycle phase
//! it is currently in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally observable health of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// Fully operational
    Available,
    /// Refuses every call until the next successful rebuild
    #[default]
    Unavailable,
    /// Transient outage: callers should back off and retry
    TemporarilyUnavailable,
    /// Part of the component surface (or of its pool) is usable
    PartiallyAvailable,
    /// Usable with reduced guarantees
    Degraded,
}

impl ComponentStatus {
    /// All statuses, worst first
    pub const BY_SEVERITY: [ComponentStatus; 5] = [
        ComponentStatus::Unavailable,
        ComponentStatus::TemporarilyUnavailable,
        ComponentStatus::PartiallyAvailable,
        ComponentStatus::Degraded,
        ComponentStatus::Available,
    ];

    /// Severity rank, higher is worse
    pub fn severity(self) -> u8 {
        match self {
            Self::Available => 0,
            Self::Degraded => 1,
            Self::PartiallyAvailable => 2,
            Self::TemporarilyUnavailable => 3,
            Self::Unavailable => 4,
        }
    }

    /// Return the more severe of two statuses
    pub fn worst(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Whether business calls may run against a component in this status
    pub fn accepts_calls(self) -> bool {
        !matches!(self, Self::Unavailable | Self::TemporarilyUnavailable)
    }

    /// Whether the component is fully operational
    pub fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::PartiallyAvailable => "partially_available",
            Self::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

/// Lifecycle phase of a component instance
///
/// `Building` and `Destroying` are only ever observed by the writer that
/// holds the component lock; readers see the phase before or after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Instantiated, never built
    #[default]
    Unbuilt,
    /// A build pass is in progress
    Building,
    /// At least one build pass completed
    Built,
    /// Teardown in progress
    Destroying,
    /// Torn down
    Destroyed,
}
