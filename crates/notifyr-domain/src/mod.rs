//! # Domain Layer
//!
//! Pure types shared by the Notifyr service runtime and every component that
//! plugs into it. No async runtime, no I/O.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`status`] | `ComponentStatus` and `LifecyclePhase` |
//! | [`build`] | `BuildOutcome`, `BuildToken`, `BuildError`, `BuildReport` |
//! | [`credential`] | Leased credentials and their freshness window |
//! | [`error`] | Runtime error taxonomy and the call-gate errors |
//! | [`constants`] | Domain constants |

pub mod build;
pub mod constants;
pub mod credential;
pub mod error;
pub mod status;

pub use build::{BuildError, BuildOutcome, BuildReport, BuildResult, BuildResultExt, BuildToken};
pub use credential::{Credential, CredentialState};
pub use error::{Error, GateError, Result};
pub use status::{ComponentStatus, LifecyclePhase};
