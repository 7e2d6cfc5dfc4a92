//! Credential rotation
//!
//! Components holding leased credentials implement [`CredentialRotator`] and
//! are wrapped with [`ComponentCell::rotating`]. After every usable build a
//! single recurring timer is armed slightly before the lease expires; each
//! tick rotates under the component's writer lock, so business calls never
//! observe a half-installed credential.

use crate::component::Component;
use crate::config::{Backoff, RotationConfig};
use crate::events::LifecycleEvent;
use crate::guard::Gate;
use crate::lifecycle::ComponentCell;
use async_trait::async_trait;
use notifyr_domain::credential::{Credential, CredentialState};
use notifyr_domain::error::GateError;
use notifyr_domain::status::ComponentStatus;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why a rotation attempt failed
#[derive(Debug, Error)]
pub enum RotationError {
    /// The secret store rejected our token; worth retrying
    #[error("transient authentication failure: {0}")]
    TransientAuth(String),
    /// Anything else; no retry
    #[error("rotation failed: {0}")]
    Failed(String),
}

/// Retry and scheduling parameters of one rotating component
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    pub max_retry: u32,
    pub wait: Duration,
    pub backoff: Backoff,
    pub offset: Duration,
    pub jitter_ratio: f64,
    pub buffer_min_secs: u64,
    pub buffer_max_secs: u64,
}

impl RotationPolicy {
    /// Wait before retry number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Constant => self.wait,
            Backoff::Linear => self.wait * (retry + 1) + self.offset,
        }
    }

    /// Time until the next rotation: `ttl - (ttl * ratio * U(0,1) + U(buffer))`
    pub fn next_period(&self, ttl: Duration) -> Duration {
        let mut rng = rand::rng();
        let proportional = ttl.as_secs_f64() * self.jitter_ratio * rng.random::<f64>();
        let (low, high) = if self.buffer_min_secs <= self.buffer_max_secs {
            (self.buffer_min_secs, self.buffer_max_secs)
        } else {
            (self.buffer_max_secs, self.buffer_min_secs)
        };
        let buffer = rng.random_range(low..=high) as f64;
        let period = ttl.as_secs_f64() - proportional - buffer;
        let floor = notifyr_domain::constants::ROTATION_MIN_PERIOD_SECS as f64;
        Duration::from_secs_f64(period.max(floor))
    }
}

impl From<&RotationConfig> for RotationPolicy {
    fn from(config: &RotationConfig) -> Self {
        Self {
            max_retry: config.max_retry,
            wait: Duration::from_millis(config.wait_ms),
            backoff: config.backoff,
            offset: Duration::from_millis(config.offset_ms),
            jitter_ratio: config.jitter_ratio,
            buffer_min_secs: config.buffer_min_secs,
            buffer_max_secs: config.buffer_max_secs,
        }
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::from(&RotationConfig::default())
    }
}

/// A component whose credentials are leased from a secret store
#[async_trait]
pub trait CredentialRotator: Component {
    /// Current credential slot
    fn credentials(&self) -> &CredentialState;

    /// Mutable credential slot
    fn credentials_mut(&mut self) -> &mut CredentialState;

    /// Retry and scheduling parameters
    fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy::default()
    }

    /// Status of the secret store, read before each rotation
    async fn upstream_status(&self) -> ComponentStatus;

    /// Fetch a fresh credential
    async fn rotate(&mut self) -> Result<Credential, RotationError>;
}

/// What one rotation tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// A fresh credential was installed
    Rotated { attempts: u32 },
    /// The secret store is down; its status was adopted, nothing rotated
    UpstreamAdopted(ComponentStatus),
    /// Every transient retry failed; the old credential stays
    Exhausted { attempts: u32 },
    /// A non-transient error ended the tick
    Failed { attempts: u32, message: String },
    /// The component was destroyed
    Cancelled,
}

impl<C: CredentialRotator> ComponentCell<C> {
    /// Wrap a rotating component; the timer is armed after each usable build
    pub fn rotating<S: Into<String>>(name: S, component: C) -> Arc<Self> {
        Self::with_after_build(name.into(), component, Some(arm_rotation::<C>))
    }

    /// Enter a privileged call: the normal gate plus a fresh credential
    pub async fn fresh_gate(&self, method: &str) -> Result<Gate<'_, C>, GateError> {
        let gate = self.gate(method).await?;
        gate.credentials().ensure_fresh()?;
        Ok(gate)
    }
}

/// Run one rotation tick now
pub async fn rotate_now<C: CredentialRotator>(cell: &ComponentCell<C>) -> RotationOutcome {
    let name = cell.name().to_string();
    let mut guard = cell.guard().write().await;
    if guard.state.destroyed {
        return RotationOutcome::Cancelled;
    }

    let upstream = guard.inner.upstream_status().await;
    if upstream != ComponentStatus::Available {
        let previous = std::mem::replace(&mut guard.state.status, upstream);
        drop(guard);
        warn!(component = %name, %upstream, "Secret store not available, rotation skipped");
        cell.publish(LifecycleEvent::StatusChanged {
            component: name,
            previous,
            status: upstream,
        });
        return RotationOutcome::UpstreamAdopted(upstream);
    }

    let policy = guard.inner.rotation_policy();
    let mut attempts = 0;
    loop {
        attempts += 1;
        match guard.inner.rotate().await {
            Ok(credential) => {
                guard.inner.credentials_mut().install(credential);
                let previous =
                    std::mem::replace(&mut guard.state.status, ComponentStatus::Available);
                drop(guard);
                info!(component = %name, attempts, "Credential rotated");
                cell.publish(LifecycleEvent::CredentialRotated {
                    component: name.clone(),
                    attempts,
                });
                if previous != ComponentStatus::Available {
                    cell.publish(LifecycleEvent::StatusChanged {
                        component: name,
                        previous,
                        status: ComponentStatus::Available,
                    });
                }
                return RotationOutcome::Rotated { attempts };
            }
            Err(RotationError::TransientAuth(message)) if attempts <= policy.max_retry => {
                let delay = policy.delay(attempts - 1);
                warn!(
                    component = %name,
                    attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %message,
                    "Transient authentication failure, retrying rotation"
                );
                tokio::time::sleep(delay).await;
            }
            Err(RotationError::TransientAuth(message)) => {
                drop(guard);
                error!(
                    component = %name,
                    attempts,
                    error = %message,
                    "Rotation retries exhausted, keeping current credential"
                );
                cell.publish(LifecycleEvent::RotationExhausted {
                    component: name,
                    attempts,
                });
                return RotationOutcome::Exhausted { attempts };
            }
            Err(RotationError::Failed(message)) => {
                drop(guard);
                error!(component = %name, attempts, error = %message, "Rotation failed");
                return RotationOutcome::Failed { attempts, message };
            }
        }
    }
}

/// Arm (or re-arm) the recurring rotation timer of `cell`
fn arm_rotation<C: CredentialRotator>(cell: &Arc<ComponentCell<C>>) {
    let token = CancellationToken::new();
    cell.replace_timer(token.clone());
    let weak = Arc::downgrade(cell);
    let name = cell.name().to_string();

    tokio::spawn(async move {
        loop {
            let Some(cell) = weak.upgrade() else { break };
            let period = {
                let guard = cell.guard().read().await;
                let component = guard.component();
                component
                    .rotation_policy()
                    .next_period(component.credentials().ttl())
            };
            drop(cell);
            debug!(component = %name, period_secs = period.as_secs(), "Next rotation scheduled");

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(period) => {}
            }

            let Some(cell) = weak.upgrade() else { break };
            if rotate_now(&cell).await == RotationOutcome::Cancelled {
                break;
            }
        }
        debug!(component = %name, "Rotation timer stopped");
    });
}
