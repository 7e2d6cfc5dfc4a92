//! Configuration types
//!
//! Every section derives `Default` so partial TOML files and environment
//! overrides merge on top of complete defaults.

use crate::constants::*;
use notifyr_domain::constants::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// What the runtime does when a build pass ends in `Abort`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AbortPolicy {
    /// Return `Error::BuildAborted` to the caller (`start` also shuts down
    /// the components booted so far)
    #[default]
    Propagate,
    /// Log and terminate the process immediately
    Exit,
}

/// Retry backoff between rotation attempts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Always wait `wait_ms`
    #[default]
    Constant,
    /// Wait `(retry + 1) * wait_ms + offset_ms`
    Linear,
}

/// Root runtime configuration
///
/// ```toml
/// mode = "mirror"
/// abort_policy = "exit"
///
/// [flags]
/// twilio_enabled = true
///
/// [rotation]
/// max_retry = 3
/// backoff = "linear"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Process mode, matched against `Mirror` declarations
    pub mode: String,

    /// Named booleans available to `BuildOnlyIf` predicates
    pub flags: HashMap<String, bool>,

    /// Abort handling for boot passes and later rebuilds
    pub abort_policy: AbortPolicy,

    /// Lifecycle event bus
    pub events: EventsConfig,

    /// Blocking worker pool
    pub blocking: BlockingConfig,

    /// Credential rotation defaults
    pub rotation: RotationConfig,

    /// Logging
    pub logging: LoggingConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: DEFAULT_MODE.to_string(),
            flags: HashMap::new(),
            abort_policy: AbortPolicy::default(),
            events: EventsConfig::default(),
            blocking: BlockingConfig::default(),
            rotation: RotationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Set a flag, returning the updated configuration
    pub fn with_flag<S: Into<String>>(mut self, name: S, value: bool) -> Self {
        self.flags.insert(name.into(), value);
        self
    }

    /// Set the process mode
    pub fn with_mode<S: Into<String>>(mut self, mode: S) -> Self {
        self.mode = mode.into();
        self
    }
}

/// Lifecycle event bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel capacity
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: EVENT_BUS_CAPACITY,
        }
    }
}

/// Blocking worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockingConfig {
    /// Maximum concurrently running blocking jobs
    pub max_threads: usize,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            max_threads: BLOCKING_POOL_MAX_THREADS,
        }
    }
}

/// Credential rotation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Upper bound of the proportional jitter, as a fraction of the ttl
    pub jitter_ratio: f64,

    /// Lower bound of the fixed buffer (seconds)
    pub buffer_min_secs: u64,

    /// Upper bound of the fixed buffer (seconds)
    pub buffer_max_secs: u64,

    /// Retries after the first attempt on transient authentication failures
    pub max_retry: u32,

    /// Base wait between attempts (milliseconds)
    pub wait_ms: u64,

    /// Backoff shape
    pub backoff: Backoff,

    /// Extra wait added by the linear backoff (milliseconds)
    pub offset_ms: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            jitter_ratio: ROTATION_JITTER_RATIO,
            buffer_min_secs: ROTATION_BUFFER_MIN_SECS,
            buffer_max_secs: ROTATION_BUFFER_MAX_SECS,
            max_retry: ROTATION_DEFAULT_MAX_RETRY,
            wait_ms: ROTATION_DEFAULT_WAIT_MS,
            backoff: Backoff::default(),
            offset_ms: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON output format
    pub json_format: bool,

    /// Log to a daily rolling file in addition to stdout
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json_format: false,
            file_output: None,
        }
    }
}
