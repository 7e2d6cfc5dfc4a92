//! Per-component reader/writer guard
//!
//! One tokio `RwLock` owns both the lifecycle state and the component value,
//! so a business call can never observe a half-built component. Build,
//! destroy and direct status assignment take the writer side; business calls
//! go through [`ConcurrencyGuard::gate`].

use notifyr_domain::build::BuildReport;
use notifyr_domain::error::GateError;
use notifyr_domain::status::{ComponentStatus, LifecyclePhase};
use std::collections::HashSet;
use std::ops::Deref;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Lifecycle state guarded together with the component
#[derive(Debug, Clone, Default)]
pub struct GuardState {
    pub(crate) status: ComponentStatus,
    pub(crate) phase: LifecyclePhase,
    pub(crate) built: bool,
    pub(crate) destroyed: bool,
    pub(crate) disabled_methods: HashSet<String>,
    pub(crate) last_report: Option<BuildReport>,
}

impl GuardState {
    /// Current status
    pub fn status(&self) -> ComponentStatus {
        self.status
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Whether a non-aborting build pass completed since the last destroy
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Whether the component was destroyed
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Methods disabled by the last build pass
    pub fn disabled_methods(&self) -> &HashSet<String> {
        &self.disabled_methods
    }

    /// Report of the last build pass
    pub fn last_report(&self) -> Option<&BuildReport> {
        self.last_report.as_ref()
    }

    /// Decide whether a call may proceed
    pub(crate) fn check(&self, component: &str, method: &str) -> Result<(), GateError> {
        let component = component.to_string();
        if self.destroyed {
            return Err(GateError::Destroyed { component });
        }
        if !self.built {
            return Err(GateError::NotBuilt { component });
        }
        match self.status {
            ComponentStatus::Unavailable => return Err(GateError::Unavailable { component }),
            ComponentStatus::TemporarilyUnavailable => {
                return Err(GateError::TemporarilyUnavailable { component });
            }
            _ => {}
        }
        if self.disabled_methods.contains(method) {
            return Err(GateError::MethodDisabled {
                component,
                method: method.to_string(),
            });
        }
        Ok(())
    }
}

/// Lifecycle state plus the component it guards
#[derive(Debug)]
pub struct Guarded<C> {
    pub(crate) state: GuardState,
    pub(crate) inner: C,
}

impl<C> Guarded<C> {
    /// Lifecycle state
    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// The guarded component
    pub fn component(&self) -> &C {
        &self.inner
    }
}

/// Reader/writer guard of one component
#[derive(Debug)]
pub struct ConcurrencyGuard<C> {
    name: String,
    lock: RwLock<Guarded<C>>,
}

impl<C> ConcurrencyGuard<C> {
    /// Guard `component` in the Unbuilt phase
    pub fn new<S: Into<String>>(name: S, component: C) -> Self {
        Self {
            name: name.into(),
            lock: RwLock::new(Guarded {
                state: GuardState::default(),
                inner: component,
            }),
        }
    }

    /// Enter a business call
    ///
    /// Waits behind any in-flight writer, then re-checks the state. The
    /// returned gate keeps the read lock for the whole call.
    pub async fn gate(&self, method: &str) -> Result<Gate<'_, C>, GateError> {
        let guard = self.lock.read().await;
        guard.state.check(&self.name, method)?;
        Ok(Gate {
            guard: RwLockReadGuard::map(guard, |g| &g.inner),
        })
    }

    /// Read the state and component without the call checks
    pub async fn read(&self) -> RwLockReadGuard<'_, Guarded<C>> {
        self.lock.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, Guarded<C>> {
        self.lock.write().await
    }

    /// Current status, waiting behind an in-flight writer
    pub async fn status(&self) -> ComponentStatus {
        self.lock.read().await.state.status
    }

    /// Current status if no writer holds the lock
    pub fn try_status(&self) -> Option<ComponentStatus> {
        self.lock.try_read().ok().map(|g| g.state.status)
    }
}

/// Read access to a component admitted by the gate
pub struct Gate<'a, C> {
    guard: RwLockReadGuard<'a, C>,
}

impl<C> Deref for Gate<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.guard
    }
}
