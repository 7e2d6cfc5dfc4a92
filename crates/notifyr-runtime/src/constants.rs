//! Runtime layer constants
//!
//! Contains constants that are part of the runtime implementation.
//! Rotation and credential defaults are defined in `notifyr_domain::constants`.

// ============================================================================
// CONFIGURATION CONSTANTS
// ============================================================================

/// Default configuration file name
pub const DEFAULT_CONFIG_FILENAME: &str = "notifyr.toml";

/// Default configuration directory name
pub const DEFAULT_CONFIG_DIR: &str = "notifyr";

/// Environment variable prefix for configuration
pub const CONFIG_ENV_PREFIX: &str = "NOTIFYR";

/// Separator for nested keys in environment variables (`NOTIFYR_ROTATION__MAX_RETRY`)
pub const CONFIG_ENV_SEPARATOR: &str = "__";

/// Process mode used when none is configured
pub const DEFAULT_MODE: &str = "default";

// ============================================================================
// LOGGING CONSTANTS
// ============================================================================

/// Environment variable overriding the log filter
pub const LOG_ENV_FILTER: &str = "NOTIFYR_LOG";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// File stem used when the log path has none
pub const DEFAULT_LOG_FILE_STEM: &str = "notifyr";

// ============================================================================
// RUNTIME CONSTANTS
// ============================================================================

/// Capacity of the lifecycle event broadcast channel
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Default number of concurrent blocking jobs
pub const BLOCKING_POOL_MAX_THREADS: usize = 16;

/// Exit code used when a build aborts under `AbortPolicy::Exit`
pub const ABORT_EXIT_CODE: i32 = 70;

// ============================================================================
// HEALTH CHECK CONSTANTS
// ============================================================================

/// Health check status - Up
pub const HEALTH_STATUS_UP: &str = "up";

/// Health check status - Degraded
pub const HEALTH_STATUS_DEGRADED: &str = "degraded";

/// Health check status - Down
pub const HEALTH_STATUS_DOWN: &str = "down";
