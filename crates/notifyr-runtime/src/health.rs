//! Runtime health reporting
//!
//! Maps component statuses to operator-facing health checks and aggregates
//! them into one response (Down dominates, then Degraded).

use crate::constants::{HEALTH_STATUS_DEGRADED, HEALTH_STATUS_DOWN, HEALTH_STATUS_UP};
use crate::lifecycle::StatusSnapshot;
use crate::logging::log_health_check;
use crate::registry::SkippedComponent;
use notifyr_domain::status::ComponentStatus;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Health status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully operational
    Up,
    /// Operational with reduced guarantees
    Degraded,
    /// Not operational
    Down,
}

impl HealthStatus {
    /// Check if the status indicates the component is healthy
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Up)
    }

    /// Check if the component is operational (healthy or degraded)
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Up | Self::Degraded)
    }

    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => HEALTH_STATUS_UP,
            Self::Degraded => HEALTH_STATUS_DEGRADED,
            Self::Down => HEALTH_STATUS_DOWN,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ComponentStatus> for HealthStatus {
    fn from(status: ComponentStatus) -> Self {
        match status {
            ComponentStatus::Available => Self::Up,
            ComponentStatus::Degraded | ComponentStatus::PartiallyAvailable => Self::Degraded,
            ComponentStatus::Unavailable | ComponentStatus::TemporarilyUnavailable => Self::Down,
        }
    }
}

/// Health of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Component name
    pub name: String,
    /// Derived health
    pub status: HealthStatus,
    /// Underlying component status, absent for skipped components
    pub component_status: Option<ComponentStatus>,
    /// Timestamp of the check
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Optional error message
    pub error: Option<String>,
    /// Additional details
    pub details: Option<serde_json::Value>,
}

impl HealthCheck {
    /// Health derived from a component snapshot
    pub fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        let report = snapshot.last_report.as_ref();
        let error = if snapshot.status.accepts_calls() {
            None
        } else {
            report.and_then(|r| r.message.clone())
        };
        Self {
            name: snapshot.name.clone(),
            status: snapshot.status.into(),
            component_status: Some(snapshot.status),
            timestamp: chrono::Utc::now(),
            error,
            details: Some(json!({
                "phase": snapshot.phase,
                "last_outcome": report.map(|r| r.outcome),
                "disabled_methods": snapshot.disabled_methods,
                "mini_services": snapshot.mini_services,
            })),
        }
    }

    /// Health of a component pruned at plan time
    pub fn skipped(skipped: &SkippedComponent) -> Self {
        Self {
            name: skipped.name.clone(),
            status: HealthStatus::Degraded,
            component_status: None,
            timestamp: chrono::Utc::now(),
            error: None,
            details: Some(json!({ "skipped": skipped.reason })),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status
    pub status: HealthStatus,
    /// Timestamp of the health check
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Total response time in milliseconds
    pub response_time_ms: u64,
    /// Runtime uptime in seconds
    pub uptime_seconds: u64,
    /// Per-component checks
    pub checks: HashMap<String, HealthCheck>,
    /// Crate version
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthResponse {
    /// Create a new health response
    pub fn new() -> Self {
        Self {
            status: HealthStatus::Up,
            timestamp: chrono::Utc::now(),
            response_time_ms: 0,
            uptime_seconds: 0,
            checks: HashMap::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Add a health check result
    pub fn add_check(mut self, check: HealthCheck) -> Self {
        if check.status == HealthStatus::Down {
            self.status = HealthStatus::Down;
        } else if check.status == HealthStatus::Degraded && self.status == HealthStatus::Up {
            self.status = HealthStatus::Degraded;
        }

        log_health_check(
            &check.name,
            check.status.is_operational(),
            check.error.as_deref(),
        );
        self.checks.insert(check.name.clone(), check);
        self
    }

    /// Set response time
    pub fn with_response_time(mut self, duration: Duration) -> Self {
        self.response_time_ms = duration.as_millis() as u64;
        self
    }

    /// Set uptime
    pub fn with_uptime(mut self, uptime: Duration) -> Self {
        self.uptime_seconds = uptime.as_secs();
        self
    }

    /// Check if every component is healthy
    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }
}
