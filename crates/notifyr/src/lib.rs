//! # Notifyr
//!
//! Service lifecycle and dependency resolution for Notifyr processes.
//!
//! This crate is the public entry point: it re-exports the domain types and
//! the runtime, and provides [`bootstrap`] to go from a registry to a running
//! process in one call.
//!
//! ## Example
//!
//! ```ignore
//! use notifyr::prelude::*;
//!
//! struct Redis;
//!
//! #[async_trait]
//! impl Component for Redis {
//!     async fn do_build(&mut self, _scope: &mut BuildScope) -> BuildResult {
//!         Ok(())
//!     }
//! }
//!
//! let registry = ComponentRegistry::new()
//!     .with(ComponentDescriptor::of("redis", |_r: &Resolver<'_>| Ok(Redis)))?;
//! let runtime = notifyr::bootstrap(&registry, None).await?;
//! let redis = runtime.get::<Redis>("redis")?;
//! ```
//!
//! ## Architecture
//!
//! - `domain` - status model, build outcomes, credentials, error taxonomy
//! - `runtime` - guard, lifecycle, registry, links, mini-services, rotation,
//!   container, configuration, logging

use std::path::Path;
use tracing::debug;

/// Domain layer - pure types
///
/// Re-exports from the domain crate for convenience
pub mod domain {
    pub use notifyr_domain::*;
}

/// Runtime layer - lifecycle, wiring and infrastructure
///
/// Re-exports from the runtime crate for convenience
pub mod runtime {
    pub use notifyr_runtime::*;
}

/// Everything a component implementation usually needs
pub mod prelude {
    pub use async_trait::async_trait;
    pub use notifyr_domain::{
        BuildError, BuildOutcome, BuildResult, BuildResultExt, BuildToken, ComponentStatus,
        Credential, CredentialState, Error, GateError, Result,
    };
    pub use notifyr_runtime::{
        BuildScope, Component, ComponentCell, ComponentDescriptor, ComponentRegistry,
        CredentialRotator, LinkSpec, MiniService, MiniServiceStore, PlanContext, Resolver,
        RotationError, RotationPolicy, Runtime, RuntimeConfig, populate,
    };
}

pub use notifyr_domain::{Error, Result};
pub use notifyr_runtime::{ComponentRegistry, Runtime, RuntimeConfig};

/// Load configuration, initialize logging and start the runtime
///
/// `config_path` overrides the default config file locations. A global
/// subscriber installed earlier (tests, embedding applications) is kept.
pub async fn bootstrap(registry: &ComponentRegistry, config_path: Option<&Path>) -> Result<Runtime> {
    let mut loader = notifyr_runtime::ConfigLoader::new();
    if let Some(path) = config_path {
        loader = loader.with_config_path(path);
    }
    let config = loader.load()?;

    if let Err(err) = notifyr_runtime::logging::init_logging(config.logging.clone()) {
        debug!(error = %err, "Keeping the existing tracing subscriber");
    }

    Runtime::start(registry, config).await
}
