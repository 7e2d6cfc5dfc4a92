//! Remote state-change protocol
//!
//! Other replicas publish state changes on a message bus; the subscriber
//! decodes them into [`StateChange`] and hands them to
//! [`Runtime::apply_state_change`](crate::runtime::Runtime::apply_state_change).

use notifyr_domain::build::BuildToken;
use notifyr_domain::error::Result;
use notifyr_domain::status::ComponentStatus;
use serde::{Deserialize, Serialize};

/// Requested status transition for one component, or for one mini-service
/// of a manager when `id` is set
///
/// ```json
/// {"component": "twilio", "status": "available", "to_build": true}
/// {"component": "webhooks", "id": "p2", "status": "unavailable", "to_destroy": true}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// Target component
    pub component: String,
    /// Entity id of a mini-service inside the target manager
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Status to assign first
    pub status: ComponentStatus,
    /// Destroy after assigning the status
    #[serde(default)]
    pub to_destroy: bool,
    /// Build after the optional destroy
    #[serde(default)]
    pub to_build: bool,
    /// Token for the build; `REMOTE` when absent
    #[serde(default)]
    pub build_token: Option<BuildToken>,
}

impl StateChange {
    /// Status-only change
    pub fn new<S: Into<String>>(component: S, status: ComponentStatus) -> Self {
        Self {
            component: component.into(),
            id: None,
            status,
            to_destroy: false,
            to_build: false,
            build_token: None,
        }
    }

    /// Address mini-service `id` of the target manager
    pub fn mini<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Request a destroy
    pub fn destroy(mut self) -> Self {
        self.to_destroy = true;
        self
    }

    /// Request a build with `token`
    pub fn build(mut self, token: BuildToken) -> Self {
        self.to_build = true;
        self.build_token = Some(token);
        self
    }

    /// Token the build runs with
    pub fn token(&self) -> BuildToken {
        self.build_token.unwrap_or(BuildToken::REMOTE)
    }

    /// Decode a message payload
    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Encode for publishing
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
