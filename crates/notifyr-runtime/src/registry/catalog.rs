//! Link-time component catalog
//!
//! Crates contribute descriptors without touching a central list:
//!
//! ```ignore
//! use notifyr_runtime::registry::{COMPONENTS, ComponentDescriptor};
//!
//! #[linkme::distributed_slice(COMPONENTS)]
//! static REDIS: fn() -> ComponentDescriptor = redis_descriptor;
//! ```

use super::ComponentRegistry;
use super::descriptor::ComponentDescriptor;
use notifyr_domain::error::Result;

/// Descriptor constructors collected at link time
#[linkme::distributed_slice]
pub static COMPONENTS: [fn() -> ComponentDescriptor] = [..];

impl ComponentRegistry {
    /// Registry holding every descriptor contributed through [`COMPONENTS`]
    pub fn from_registered() -> Result<Self> {
        let mut registry = Self::new();
        for describe in COMPONENTS {
            registry.register(describe())?;
        }
        Ok(registry)
    }
}

/// Names of the descriptors contributed through [`COMPONENTS`]
pub fn list_registered() -> Vec<String> {
    COMPONENTS
        .iter()
        .map(|describe| describe().name().to_string())
        .collect()
}
