//! Component lifecycle state machine
//!
//! [`ComponentCell`] drives a [`Component`] through
//! `Unbuilt -> Building -> Built(status) -> Destroying -> Destroyed`,
//! converting every hook result into exactly one status per pass.
//! [`ManagedComponent`] is the object-safe face the runtime stores; typed
//! access goes through `downcast_arc`.

use crate::component::{BuildScope, Component, resolve_status};
use crate::events::{EventBus, LifecycleEvent};
use crate::guard::{ConcurrencyGuard, Gate};
use crate::logging::log_build_report;
use async_trait::async_trait;
use chrono::Utc;
use downcast_rs::{DowncastSync, impl_downcast};
use futures::FutureExt;
use notifyr_domain::build::{BuildError, BuildOutcome, BuildReport, BuildResult, BuildToken};
use notifyr_domain::error::{Error, GateError, Result};
use notifyr_domain::status::{ComponentStatus, LifecyclePhase};
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Called after every usable build pass (rotation arming)
pub(crate) type AfterBuild<C> = fn(&Arc<ComponentCell<C>>);

/// Operator-facing view of a component
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub name: String,
    pub status: ComponentStatus,
    pub phase: LifecyclePhase,
    pub built: bool,
    pub destroyed: bool,
    pub disabled_methods: Vec<String>,
    pub last_report: Option<BuildReport>,
    pub mini_services: Option<usize>,
}

/// A component, its guard and its lifecycle
pub struct ComponentCell<C: Component> {
    name: String,
    guard: ConcurrencyGuard<C>,
    this: Weak<ComponentCell<C>>,
    after_build: Option<AfterBuild<C>>,
    timer: Mutex<Option<CancellationToken>>,
    events: OnceLock<EventBus>,
}

impl<C: Component> ComponentCell<C> {
    /// Wrap `component` under `name`
    pub fn new<S: Into<String>>(name: S, component: C) -> Arc<Self> {
        Self::with_after_build(name.into(), component, None)
    }

    pub(crate) fn with_after_build(
        name: String,
        component: C,
        after_build: Option<AfterBuild<C>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            guard: ConcurrencyGuard::new(name.clone(), component),
            name,
            this: this.clone(),
            after_build,
            timer: Mutex::new(None),
            events: OnceLock::new(),
        })
    }

    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enter a business call on `method`
    pub async fn gate(&self, method: &str) -> std::result::Result<Gate<'_, C>, GateError> {
        self.guard.gate(method).await
    }

    /// The component's guard
    pub fn guard(&self) -> &ConcurrencyGuard<C> {
        &self.guard
    }

    /// Current status
    pub async fn status(&self) -> ComponentStatus {
        self.guard.status().await
    }

    /// Run one build pass
    ///
    /// Waits for the writer lock, so an in-flight build or destroy finishes
    /// first. Returns `Error::BuildAborted` when the pass ends in `Abort`;
    /// every other outcome yields a report.
    pub async fn build(&self, token: BuildToken) -> Result<BuildReport> {
        let started = Instant::now();
        let mut guard = self.guard.write().await;
        let previous = guard.state.status;
        guard.state.phase = LifecyclePhase::Building;

        let mut scope = BuildScope::new(&self.name, token);
        let result = AssertUnwindSafe(run_hooks(&mut guard.inner, &mut scope))
            .catch_unwind()
            .await;

        let mut not_implemented = false;
        let (outcome, message) = match result {
            Ok(Ok(())) => (BuildOutcome::Ok, None),
            Ok(Err(err)) => {
                not_implemented = matches!(err, BuildError::NotImplemented);
                (err.outcome(), Some(err.to_string()))
            }
            Err(panic) => (
                BuildOutcome::Abort,
                Some(format!("panic during build: {}", panic_message(&*panic))),
            ),
        };
        let status = resolve_status(outcome, scope.status_override());

        let report = BuildReport {
            component: self.name.clone(),
            token,
            outcome,
            status,
            message,
            elapsed_ms: started.elapsed().as_millis() as u64,
            finished_at: Utc::now(),
        };

        let state = &mut guard.state;
        state.status = status;
        state.phase = LifecyclePhase::Built;
        state.built = !outcome.is_fatal();
        state.destroyed = false;
        state.disabled_methods = scope.take_disabled();
        state.last_report = Some(report.clone());
        drop(guard);

        log_build_report(&report, not_implemented);
        self.publish(LifecycleEvent::Built {
            component: self.name.clone(),
            token,
            outcome,
            previous,
            status,
        });

        if outcome.is_fatal() {
            return Err(Error::BuildAborted {
                component: self.name.clone(),
                reason: report.message.unwrap_or_default(),
            });
        }

        if outcome.is_usable() {
            if let (Some(after_build), Some(this)) = (self.after_build, self.this.upgrade()) {
                after_build(&this);
            }
        }

        Ok(report)
    }

    /// Tear the component down
    ///
    /// Best effort and idempotent: hook errors and panics are logged, a
    /// second call is a no-op.
    pub async fn destroy(&self) {
        self.cancel_timer();
        let mut guard = self.guard.write().await;
        if guard.state.destroyed {
            debug!(component = %self.name, "Component already destroyed");
            return;
        }
        guard.state.phase = LifecyclePhase::Destroying;

        let result = AssertUnwindSafe(guard.inner.do_destroy())
            .catch_unwind()
            .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(component = %self.name, error = %err, "Destroy hook failed, continuing");
            }
            Err(panic) => {
                error!(
                    component = %self.name,
                    panic = %panic_message(&*panic),
                    "Destroy hook panicked, continuing"
                );
            }
        }

        let state = &mut guard.state;
        state.status = ComponentStatus::Unavailable;
        state.phase = LifecyclePhase::Destroyed;
        state.built = false;
        state.destroyed = true;
        state.disabled_methods.clear();
        drop(guard);

        info!(component = %self.name, "Component destroyed");
        self.publish(LifecycleEvent::Destroyed {
            component: self.name.clone(),
        });
    }

    /// Assign the status directly under the writer lock
    pub async fn set_status(&self, status: ComponentStatus) {
        let previous = {
            let mut guard = self.guard.write().await;
            std::mem::replace(&mut guard.state.status, status)
        };
        if previous != status {
            info!(component = %self.name, %previous, %status, "Status assigned");
        }
        self.publish(LifecycleEvent::StatusChanged {
            component: self.name.clone(),
            previous,
            status,
        });
    }

    /// Operator-facing view
    pub async fn snapshot(&self) -> StatusSnapshot {
        let guard = self.guard.read().await;
        let state = guard.state();
        let mut disabled_methods: Vec<String> = state.disabled_methods().iter().cloned().collect();
        disabled_methods.sort();
        StatusSnapshot {
            name: self.name.clone(),
            status: state.status(),
            phase: state.phase(),
            built: state.is_built(),
            destroyed: state.is_destroyed(),
            disabled_methods,
            last_report: state.last_report().cloned(),
            mini_services: guard.component().mini_service_count(),
        }
    }

    /// Attach the runtime event bus; later calls are ignored
    pub fn attach_events(&self, events: EventBus) {
        let _ = self.events.set(events);
    }

    pub(crate) fn publish(&self, event: LifecycleEvent) {
        if let Some(events) = self.events.get() {
            events.publish(event);
        }
    }

    /// Install a new rotation timer, cancelling the previous one
    pub(crate) fn replace_timer(&self, token: CancellationToken) {
        let mut slot = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(token) {
            previous.cancel();
        }
    }

    fn cancel_timer(&self) {
        let mut slot = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = slot.take() {
            token.cancel();
        }
    }
}

impl<C: Component> Drop for ComponentCell<C> {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

async fn run_hooks<C: Component>(component: &mut C, scope: &mut BuildScope) -> BuildResult {
    component.check_service()?;
    component.verify_dependency(scope).await?;
    component.do_build(scope).await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Object-safe view of a [`ComponentCell`] stored by the runtime
#[async_trait]
pub trait ManagedComponent: DowncastSync {
    /// Registered name
    fn name(&self) -> &str;

    /// Rust type of the wrapped component
    fn type_name(&self) -> &'static str;

    /// Run one build pass
    async fn build(&self, token: BuildToken) -> Result<BuildReport>;

    /// Tear down, best effort and idempotent
    async fn destroy(&self);

    /// Current status
    async fn status(&self) -> ComponentStatus;

    /// Operator-facing view
    async fn snapshot(&self) -> StatusSnapshot;

    /// Assign the status under the writer lock
    async fn set_status(&self, status: ComponentStatus);

    /// Mini-service `id` pooled by this component, if it is a manager
    async fn mini_service(&self, id: &str) -> Option<Arc<dyn ManagedComponent>>;

    /// Attach the runtime event bus
    fn attach_events(&self, events: EventBus);
}
impl_downcast!(sync ManagedComponent);

#[async_trait]
impl<C: Component> ManagedComponent for ComponentCell<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<C>()
    }

    async fn build(&self, token: BuildToken) -> Result<BuildReport> {
        ComponentCell::build(self, token).await
    }

    async fn destroy(&self) {
        ComponentCell::destroy(self).await
    }

    async fn status(&self) -> ComponentStatus {
        ComponentCell::status(self).await
    }

    async fn snapshot(&self) -> StatusSnapshot {
        ComponentCell::snapshot(self).await
    }

    async fn set_status(&self, status: ComponentStatus) {
        ComponentCell::set_status(self, status).await
    }

    async fn mini_service(&self, id: &str) -> Option<Arc<dyn ManagedComponent>> {
        self.guard.read().await.component().mini_service(id)
    }

    fn attach_events(&self, events: EventBus) {
        ComponentCell::attach_events(self, events)
    }
}
