//! Domain constants
//!
//! Infrastructure tunables (config file names, pool sizes) live in
//! `notifyr_runtime::constants`.

/// Default credential ttl in seconds (1 hour)
pub const DEFAULT_CREDENTIAL_TTL_SECS: u64 = 3600;

/// Fraction of the ttl used as the upper bound of the random rotation jitter
pub const ROTATION_JITTER_RATIO: f64 = 0.08;

/// Lower bound of the fixed rotation buffer in seconds
pub const ROTATION_BUFFER_MIN_SECS: u64 = 20;

/// Upper bound of the fixed rotation buffer in seconds
pub const ROTATION_BUFFER_MAX_SECS: u64 = 40;

/// Default number of retries on a transient authentication failure
pub const ROTATION_DEFAULT_MAX_RETRY: u32 = 2;

/// Default wait between rotation retries in milliseconds
pub const ROTATION_DEFAULT_WAIT_MS: u64 = 2000;

/// Shortest rotation period the scheduler accepts, in seconds
pub const ROTATION_MIN_PERIOD_SECS: u64 = 1;
