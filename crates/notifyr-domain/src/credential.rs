//! Leased credentials
//!
//! A credential is issued by a secret store to exactly one component and is
//! never shared. Staleness is self-reported from `issued_at` and the lease
//! ttl, independently of the component status.

use crate::error::GateError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Username/password pair leased from a secret store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Database or service user
    pub username: String,
    /// Secret part of the credential
    pub password: String,
    /// Lease identifier used for renewal and revocation
    pub lease_id: String,
    /// Lease duration granted by the secret store
    pub lease_duration_secs: u64,
    /// When the secret store issued this credential
    pub issued_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential issued now
    pub fn issued_now(
        username: impl Into<String>,
        password: impl Into<String>,
        lease_id: impl Into<String>,
        lease_duration_secs: u64,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            lease_id: lease_id.into(),
            lease_duration_secs,
            issued_at: Utc::now(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("lease_id", &self.lease_id)
            .field("lease_duration_secs", &self.lease_duration_secs)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Credential slot owned by a rotating component
#[derive(Debug, Clone)]
pub struct CredentialState {
    owner: String,
    current: Option<Credential>,
    ttl: Duration,
    rotations: u64,
}

impl CredentialState {
    /// Empty slot owned by `owner` for credentials living `ttl`
    pub fn new(owner: impl Into<String>, ttl: Duration) -> Self {
        Self {
            owner: owner.into(),
            current: None,
            ttl,
            rotations: 0,
        }
    }

    /// Declared credential ttl
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current credential, if one was installed
    pub fn current(&self) -> Option<&Credential> {
        self.current.as_ref()
    }

    /// Issue time of the current credential
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.current.as_ref().map(|c| c.issued_at)
    }

    /// Number of credentials installed so far
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// Replace the current credential
    pub fn install(&mut self, credential: Credential) {
        self.current = Some(credential);
        self.rotations += 1;
    }

    /// Drop the current credential
    pub fn clear(&mut self) -> Option<Credential> {
        self.current.take()
    }

    /// `now - issued_at < ttl`
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// Freshness evaluated at a given instant
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        let Some(credential) = &self.current else {
            return false;
        };
        let Ok(ttl) = ChronoDuration::from_std(self.ttl) else {
            return true;
        };
        now.signed_duration_since(credential.issued_at) < ttl
    }

    /// Refuse privileged work once the credential went stale
    pub fn ensure_fresh(&self) -> std::result::Result<&Credential, GateError> {
        match &self.current {
            Some(credential) if self.is_fresh() => Ok(credential),
            _ => Err(GateError::TemporarilyUnavailable {
                component: self.owner.clone(),
            }),
        }
    }
}
