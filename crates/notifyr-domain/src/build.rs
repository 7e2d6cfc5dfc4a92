//! Build outcomes, tokens and reports
//!
//! A build pass returns `BuildResult`; the lifecycle maps the error variant
//! to a [`BuildOutcome`] and the outcome to a [`ComponentStatus`]. Severity is
//! encoded in the variant, never in the error source type.

use crate::status::ComponentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result of a lifecycle hook
pub type BuildResult = std::result::Result<(), BuildError>;

/// Five-valued result of an attempted build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    /// Unrecoverable: the process must not keep running half-initialized
    Abort,
    /// The component refuses calls until the next successful rebuild
    Failure,
    /// Usable, flagged for operators
    Warning,
    /// Usable, a minor part was skipped
    Skip,
    /// Built
    Ok,
}

impl BuildOutcome {
    /// Status a component ends in after a pass with this outcome
    pub fn status(self) -> ComponentStatus {
        match self {
            Self::Ok => ComponentStatus::Available,
            Self::Warning | Self::Skip => ComponentStatus::Degraded,
            Self::Failure | Self::Abort => ComponentStatus::Unavailable,
        }
    }

    /// Whether this outcome terminates the process
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Abort)
    }

    /// Whether the component is usable after this outcome
    pub fn is_usable(self) -> bool {
        matches!(self, Self::Ok | Self::Warning | Self::Skip)
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Abort => "abort",
            Self::Failure => "failure",
            Self::Warning => "warning",
            Self::Skip => "skip",
            Self::Ok => "ok",
        };
        f.write_str(s)
    }
}

/// Opaque marker telling a `do_build` implementation why it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct BuildToken(u32);

impl BuildToken {
    /// First-ever boot
    pub const BOOT: BuildToken = BuildToken(0);
    /// Cascading rebuild triggered by an upstream link
    pub const LINK: BuildToken = BuildToken(1);
    /// Rebuild after a credential rotation
    ///
    /// Reserved for callers: in-process rotation swaps the credential
    /// without a build pass, so the runtime never issues it. Publishers use
    /// it for replicas that rebuild a client after rotating out of band
    /// (`"build_token": 2` in a state change).
    pub const ROTATION: BuildToken = BuildToken(2);
    /// Rebuild forced by an operator
    pub const ADMIN: BuildToken = BuildToken(3);
    /// Rebuild requested by a remote state-change message
    pub const REMOTE: BuildToken = BuildToken(4);

    /// First value free for component-specific tokens
    pub const FIRST_CUSTOM: u32 = 100;

    /// Component-specific token
    pub const fn custom(value: u32) -> Self {
        BuildToken(value)
    }

    /// Raw value
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl Default for BuildToken {
    fn default() -> Self {
        Self::BOOT
    }
}

impl fmt::Display for BuildToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::BOOT => f.write_str("boot"),
            Self::LINK => f.write_str("link"),
            Self::ROTATION => f.write_str("rotation"),
            Self::ADMIN => f.write_str("admin"),
            Self::REMOTE => f.write_str("remote"),
            BuildToken(n) => write!(f, "custom({n})"),
        }
    }
}

/// Error raised by a lifecycle hook
#[derive(Debug, Error)]
pub enum BuildError {
    /// Fatal configuration or integrity problem
    #[error("build aborted: {0}")]
    Abort(String),

    /// The component cannot serve calls
    #[error("build failed: {0}")]
    Failure(String),

    /// Built with reduced guarantees
    #[error("build warning: {0}")]
    Warning(String),

    /// Part of the build was skipped
    #[error("build skipped: {0}")]
    Skip(String),

    /// The component provides no build implementation
    #[error("build not implemented")]
    NotImplemented,

    /// Undeclared error escaping a hook, treated as an abort
    #[error("unexpected error during build: {0}")]
    Unexpected(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BuildError {
    /// Create an abort error
    pub fn abort<S: Into<String>>(message: S) -> Self {
        Self::Abort(message.into())
    }

    /// Create a failure error
    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self::Failure(message.into())
    }

    /// Create a warning
    pub fn warning<S: Into<String>>(message: S) -> Self {
        Self::Warning(message.into())
    }

    /// Create a skip
    pub fn skip<S: Into<String>>(message: S) -> Self {
        Self::Skip(message.into())
    }

    /// Outcome this error stands for
    pub fn outcome(&self) -> BuildOutcome {
        match self {
            Self::Abort(_) | Self::Unexpected(_) => BuildOutcome::Abort,
            Self::Failure(_) | Self::NotImplemented => BuildOutcome::Failure,
            Self::Warning(_) => BuildOutcome::Warning,
            Self::Skip(_) => BuildOutcome::Skip,
        }
    }
}

impl From<crate::error::Error> for BuildError {
    fn from(err: crate::error::Error) -> Self {
        Self::Unexpected(Box::new(err))
    }
}

impl From<std::io::Error> for BuildError {
    fn from(err: std::io::Error) -> Self {
        Self::Unexpected(Box::new(err))
    }
}

/// Map foreign errors onto a declared build outcome
///
/// # Example
///
/// ```
/// use notifyr_domain::build::{BuildOutcome, BuildResultExt};
///
/// let connect: Result<(), std::io::Error> =
///     Err(std::io::Error::other("connection refused"));
/// let err = connect.or_failure("database unreachable").unwrap_err();
/// assert_eq!(err.outcome(), BuildOutcome::Failure);
/// ```
pub trait BuildResultExt<T> {
    /// Convert the error into `BuildError::Failure`
    fn or_failure<C: fmt::Display>(self, context: C) -> std::result::Result<T, BuildError>;

    /// Convert the error into `BuildError::Warning`
    fn or_warning<C: fmt::Display>(self, context: C) -> std::result::Result<T, BuildError>;

    /// Convert the error into `BuildError::Abort`
    fn or_abort<C: fmt::Display>(self, context: C) -> std::result::Result<T, BuildError>;
}

impl<T, E: fmt::Display> BuildResultExt<T> for std::result::Result<T, E> {
    fn or_failure<C: fmt::Display>(self, context: C) -> std::result::Result<T, BuildError> {
        self.map_err(|e| BuildError::Failure(format!("{context}: {e}")))
    }

    fn or_warning<C: fmt::Display>(self, context: C) -> std::result::Result<T, BuildError> {
        self.map_err(|e| BuildError::Warning(format!("{context}: {e}")))
    }

    fn or_abort<C: fmt::Display>(self, context: C) -> std::result::Result<T, BuildError> {
        self.map_err(|e| BuildError::Abort(format!("{context}: {e}")))
    }
}

/// Operator-facing record of one build pass
///
/// The coarse status is what callers see; the outcome is kept next to it so
/// a `Skip` and a `Warning` (both `Degraded`) stay distinguishable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    /// Component name
    pub component: String,
    /// Why the pass ran
    pub token: BuildToken,
    /// Outcome of the pass
    pub outcome: BuildOutcome,
    /// Resulting status
    pub status: ComponentStatus,
    /// Message carried by the hook error, if any
    pub message: Option<String>,
    /// Duration of the pass in milliseconds
    pub elapsed_ms: u64,
    /// When the pass finished
    pub finished_at: DateTime<Utc>,
}

impl BuildReport {
    /// Whether the component is usable after this pass
    pub fn is_usable(&self) -> bool {
        self.outcome.is_usable() && self.status.accepts_calls()
    }
}
