// Clippy allows for patterns common in lifecycle code
#![allow(clippy::collapsible_if)]

//! # Service Runtime
//!
//! Lifecycle and dependency resolution for the components of a Notifyr
//! process.
//!
//! ## Module Categories
//!
//! ### Components & Lifecycle
//! | Module | Description |
//! |--------|-------------|
//! | [`component`] | `Component` hooks and the per-pass `BuildScope` |
//! | [`guard`] | Per-component reader/writer guard and call gate |
//! | [`lifecycle`] | `ComponentCell` state machine, `ManagedComponent` |
//! | [`mini`] | Per-entity mini-service pools and status aggregation |
//! | [`rotation`] | Leased credential rotation |
//!
//! ### Wiring
//! | Module | Description |
//! |--------|-------------|
//! | [`registry`] | Descriptors, build planning, link-time catalog |
//! | [`runtime`] | The container: boot, lookup, rebuild, shutdown |
//! | [`links`] | Rebuild/destroy propagation over link edges |
//! | [`state`] | Remote state-change messages |
//!
//! ### Cross-cutting
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Figment configuration loading |
//! | [`logging`] | Structured logging with tracing |
//! | [`events`] | Lifecycle event broadcast |
//! | [`health`] | Health aggregation |
//! | [`pool`] | Bounded blocking pool |
//! | [`constants`] | Runtime constants |

pub mod component;
pub mod config;
pub mod constants;
pub mod error_ext;
pub mod events;
pub mod guard;
pub mod health;
pub mod lifecycle;
pub mod links;
pub mod logging;
pub mod mini;
pub mod pool;
pub mod registry;
pub mod rotation;
pub mod runtime;
pub mod state;

// Re-export commonly used types
pub use component::{BuildScope, Component};
pub use config::{ConfigLoader, RuntimeConfig};
pub use error_ext::ErrorContext;
pub use events::{EventBus, LifecycleEvent};
pub use guard::Gate;
pub use lifecycle::{ComponentCell, ManagedComponent, StatusSnapshot};
pub use mini::{MiniService, MiniServiceStore, StatusCounter, populate};
pub use registry::{ComponentDescriptor, ComponentRegistry, LinkSpec, PlanContext};
pub use rotation::{CredentialRotator, RotationError, RotationOutcome, RotationPolicy};
pub use runtime::{Resolver, Runtime};
pub use state::StateChange;
