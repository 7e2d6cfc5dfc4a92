//! Component lifecycle hooks
//!
//! A component implements [`Component`]; the runtime wraps it in a
//! [`ComponentCell`](crate::lifecycle::ComponentCell) that owns the lock, the
//! status and the lifecycle phase. Hooks never touch the status directly:
//! they return a [`BuildResult`] and the cell converts it exactly once.

use crate::lifecycle::ManagedComponent;
use async_trait::async_trait;
use notifyr_domain::build::{BuildError, BuildResult, BuildToken};
use notifyr_domain::status::ComponentStatus;
use std::collections::HashSet;
use std::sync::Arc;

/// Lifecycle hooks of a managed component
///
/// All hooks run under the component's writer lock, in the order
/// `check_service`, `verify_dependency`, `do_build`. The first error ends the
/// pass.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Validate static configuration (API keys present, settings coherent)
    fn check_service(&self) -> BuildResult {
        Ok(())
    }

    /// Inspect dependency statuses and disable methods that cannot work
    async fn verify_dependency(&mut self, _scope: &mut BuildScope) -> BuildResult {
        Ok(())
    }

    /// Acquire resources and become ready
    async fn do_build(&mut self, _scope: &mut BuildScope) -> BuildResult {
        Err(BuildError::NotImplemented)
    }

    /// Release resources. Errors are logged and never stop teardown.
    async fn do_destroy(&mut self) -> BuildResult {
        Ok(())
    }

    /// Size of the mini-service pool for managers
    fn mini_service_count(&self) -> Option<usize> {
        None
    }

    /// Pooled mini-service serving entity `id`, for managers
    ///
    /// Lets remote state changes address one mini-service. Managers usually
    /// delegate to [`MiniServiceStore::managed`](crate::mini::MiniServiceStore::managed).
    fn mini_service(&self, _id: &str) -> Option<Arc<dyn ManagedComponent>> {
        None
    }
}

/// Per-pass context handed to the build hooks
#[derive(Debug, Clone)]
pub struct BuildScope {
    component: String,
    token: BuildToken,
    disabled: HashSet<String>,
    status_override: Option<ComponentStatus>,
}

impl BuildScope {
    pub(crate) fn new(component: &str, token: BuildToken) -> Self {
        Self {
            component: component.to_string(),
            token,
            disabled: HashSet::new(),
            status_override: None,
        }
    }

    /// Name of the component being built
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Why this pass runs
    pub fn token(&self) -> BuildToken {
        self.token
    }

    /// Refuse calls to `method` until the next pass
    pub fn disable_method<S: Into<String>>(&mut self, method: S) {
        self.disabled.insert(method.into());
    }

    /// Undo an earlier `disable_method` in the same pass
    pub fn enable_method(&mut self, method: &str) {
        self.disabled.remove(method);
    }

    /// Whether `method` has been disabled during this pass
    pub fn is_method_disabled(&self, method: &str) -> bool {
        self.disabled.contains(method)
    }

    /// Replace the status derived from the outcome (managers use the
    /// aggregate of their mini-services)
    pub fn override_status(&mut self, status: ComponentStatus) {
        self.status_override = Some(status);
    }

    pub(crate) fn status_override(&self) -> Option<ComponentStatus> {
        self.status_override
    }

    pub(crate) fn take_disabled(&mut self) -> HashSet<String> {
        std::mem::take(&mut self.disabled)
    }
}

/// Resolve the status of a finished pass
///
/// An override replaces `Available`; for `Warning`/`Skip` the worse of the
/// override and `Degraded` wins. Failing outcomes ignore the override.
pub(crate) fn resolve_status(
    outcome: notifyr_domain::BuildOutcome,
    status_override: Option<ComponentStatus>,
) -> ComponentStatus {
    use notifyr_domain::BuildOutcome;
    let derived = outcome.status();
    match (outcome, status_override) {
        (BuildOutcome::Ok, Some(status)) => status,
        (BuildOutcome::Warning | BuildOutcome::Skip, Some(status)) => derived.worst(status),
        _ => derived,
    }
}
