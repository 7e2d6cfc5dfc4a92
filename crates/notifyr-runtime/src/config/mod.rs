//! Configuration management
//!
//! Layered loading (defaults, TOML file, environment) through figment.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{
    AbortPolicy, Backoff, BlockingConfig, EventsConfig, LoggingConfig, RotationConfig,
    RuntimeConfig,
};
