//! Shared fakes for the runtime test suites
//!
//! `Probe` is a scripted component recording every hook call, `LeasedDb` a
//! credential-rotating component backed by a scripted secret store, and
//! `WebhookManager` a manager pooling one `Webhook` per profile.

#![allow(dead_code)]

use async_trait::async_trait;
use notifyr_domain::build::{BuildError, BuildResult};
use notifyr_domain::credential::{Credential, CredentialState};
use notifyr_domain::status::ComponentStatus;
use notifyr_runtime::config::Backoff;
use notifyr_runtime::{
    BuildScope, Component, ComponentCell, CredentialRotator, ManagedComponent, MiniService,
    MiniServiceStore, RotationError, RotationPolicy, populate,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Call log
// =============================================================================

/// Ordered record of hook calls shared by several components
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

// =============================================================================
// Scripted outcomes
// =============================================================================

/// What a hook does when called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Ok,
    Warning,
    Skip,
    Failure,
    Abort,
    Panic,
    NotImplemented,
    Unexpected,
}

impl Script {
    pub fn run(self, name: &str) -> BuildResult {
        match self {
            Self::Ok => Ok(()),
            Self::Warning => Err(BuildError::warning(format!("{name}: quota low"))),
            Self::Skip => Err(BuildError::skip(format!("{name}: optional index missing"))),
            Self::Failure => Err(BuildError::failure(format!("{name}: unreachable"))),
            Self::Abort => Err(BuildError::abort(format!("{name}: secret store sealed"))),
            Self::Panic => panic!("{name}: invariant broken"),
            Self::NotImplemented => Err(BuildError::NotImplemented),
            Self::Unexpected => Err(std::io::Error::other("socket closed").into()),
        }
    }
}

// =============================================================================
// Probe
// =============================================================================

/// Scripted component
pub struct Probe {
    pub name: String,
    pub log: CallLog,
    pub verify: Script,
    pub build: Script,
    pub queued: Arc<Mutex<VecDeque<Script>>>,
    pub dependency: Option<Arc<ComponentCell<Probe>>>,
    pub disable: Vec<String>,
    pub build_delay: Option<Duration>,
    pub destroy_fails: bool,
    pub in_build: Arc<AtomicBool>,
    pub builds: Arc<AtomicU32>,
}

impl Probe {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            verify: Script::Ok,
            build: Script::Ok,
            queued: Arc::new(Mutex::new(VecDeque::new())),
            dependency: None,
            disable: Vec::new(),
            build_delay: None,
            destroy_fails: false,
            in_build: Arc::new(AtomicBool::new(false)),
            builds: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn building(mut self, script: Script) -> Self {
        self.build = script;
        self
    }

    /// Outcomes of the next passes, before falling back to `build`
    pub fn building_first(self, scripts: &[Script]) -> Self {
        self.queued.lock().unwrap().extend(scripts.iter().copied());
        self
    }

    pub fn verifying(mut self, script: Script) -> Self {
        self.verify = script;
        self
    }

    pub fn with_dependency(mut self, dependency: Arc<ComponentCell<Probe>>) -> Self {
        self.dependency = Some(dependency);
        self
    }

    pub fn disabling(mut self, method: &str) -> Self {
        self.disable.push(method.to_string());
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.build_delay = Some(delay);
        self
    }

    pub fn failing_destroy(mut self) -> Self {
        self.destroy_fails = true;
        self
    }

    /// Business method: true when no build is running underneath the call
    pub fn ping(&self) -> bool {
        !self.in_build.load(Ordering::SeqCst)
    }

    pub fn build_count(&self) -> u32 {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Component for Probe {
    async fn verify_dependency(&mut self, scope: &mut BuildScope) -> BuildResult {
        self.log.push(format!("verify:{}", self.name));
        if let Some(dependency) = &self.dependency {
            let status = dependency.status().await;
            if !status.accepts_calls() {
                return Err(BuildError::failure(format!(
                    "dependency '{}' is {status}",
                    dependency.name()
                )));
            }
        }
        for method in &self.disable {
            scope.disable_method(method.clone());
        }
        self.verify.run(&self.name)
    }

    async fn do_build(&mut self, scope: &mut BuildScope) -> BuildResult {
        self.in_build.store(true, Ordering::SeqCst);
        self.log.push(format!("build:{}:{}", self.name, scope.token()));
        if let Some(delay) = self.build_delay {
            tokio::time::sleep(delay).await;
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.in_build.store(false, Ordering::SeqCst);
        let script = self.queued.lock().unwrap().pop_front().unwrap_or(self.build);
        script.run(&self.name)
    }

    async fn do_destroy(&mut self) -> BuildResult {
        self.log.push(format!("destroy:{}", self.name));
        if self.destroy_fails {
            return Err(BuildError::failure("connection already closed"));
        }
        Ok(())
    }
}

/// Component that never implements `do_build`
pub struct Unfinished;

#[async_trait]
impl Component for Unfinished {}

// =============================================================================
// Rotating component
// =============================================================================

/// Next answer of the scripted secret store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lease {
    Granted,
    TransientAuth,
    Denied,
}

/// Database client holding a leased credential
pub struct LeasedDb {
    pub credentials: CredentialState,
    pub leases: Arc<Mutex<VecDeque<Lease>>>,
    pub attempts: Arc<AtomicU32>,
    pub secret_store: Option<Arc<ComponentCell<Probe>>>,
    pub policy: RotationPolicy,
}

impl LeasedDb {
    pub fn new(name: &str, ttl: Duration) -> Self {
        Self {
            credentials: CredentialState::new(name, ttl),
            leases: Arc::new(Mutex::new(VecDeque::new())),
            attempts: Arc::new(AtomicU32::new(0)),
            secret_store: None,
            policy: RotationPolicy {
                max_retry: 2,
                wait: Duration::from_millis(1),
                backoff: Backoff::Constant,
                offset: Duration::ZERO,
                jitter_ratio: 0.0,
                buffer_min_secs: 0,
                buffer_max_secs: 0,
            },
        }
    }

    pub fn with_secret_store(mut self, store: Arc<ComponentCell<Probe>>) -> Self {
        self.secret_store = Some(store);
        self
    }

    pub fn script(&self, leases: &[Lease]) {
        self.leases.lock().unwrap().extend(leases.iter().copied());
    }

    pub fn query(&self) -> Result<String, notifyr_domain::GateError> {
        let credential = self.credentials.ensure_fresh()?;
        Ok(format!("select as {}", credential.username))
    }
}

#[async_trait]
impl Component for LeasedDb {
    async fn do_build(&mut self, _scope: &mut BuildScope) -> BuildResult {
        self.credentials
            .install(Credential::issued_now("svc-boot", "pw", "lease/boot", 3600));
        Ok(())
    }
}

#[async_trait]
impl CredentialRotator for LeasedDb {
    fn credentials(&self) -> &CredentialState {
        &self.credentials
    }

    fn credentials_mut(&mut self) -> &mut CredentialState {
        &mut self.credentials
    }

    fn rotation_policy(&self) -> RotationPolicy {
        self.policy.clone()
    }

    async fn upstream_status(&self) -> ComponentStatus {
        match &self.secret_store {
            Some(store) => store.status().await,
            None => ComponentStatus::Available,
        }
    }

    async fn rotate(&mut self) -> Result<Credential, RotationError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let lease = self
            .leases
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Lease::Granted);
        match lease {
            Lease::Granted => Ok(Credential::issued_now(
                format!("svc-{n}"),
                "pw",
                format!("lease/{n}"),
                3600,
            )),
            Lease::TransientAuth => Err(RotationError::TransientAuth("token expired".into())),
            Lease::Denied => Err(RotationError::Failed("permission denied".into())),
        }
    }
}

// =============================================================================
// Manager with mini-services
// =============================================================================

#[derive(Debug, Clone)]
pub struct Profile {
    pub id: String,
    pub outcome: Script,
    pub secure: bool,
    pub reports: Option<ComponentStatus>,
}

impl Profile {
    pub fn new(id: &str, outcome: Script) -> Self {
        Self {
            id: id.to_string(),
            outcome,
            secure: false,
            reports: None,
        }
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Mini-service builds fine but reports `status`
    pub fn reporting(mut self, status: ComponentStatus) -> Self {
        self.reports = Some(status);
        self
    }
}

/// Delivers webhooks for one profile
pub struct Webhook {
    pub profile_id: String,
    pub outcome: Script,
    pub reports: Option<ComponentStatus>,
    pub teardowns: Arc<AtomicU32>,
}

impl Webhook {
    pub fn new(profile: &Profile, teardowns: &Arc<AtomicU32>) -> Self {
        Self {
            profile_id: profile.id.clone(),
            outcome: profile.outcome,
            reports: profile.reports,
            teardowns: Arc::clone(teardowns),
        }
    }

    pub fn target(&self) -> String {
        format!("https://hooks.example/{}", self.profile_id)
    }
}

#[async_trait]
impl Component for Webhook {
    async fn do_build(&mut self, scope: &mut BuildScope) -> BuildResult {
        self.outcome.run(&self.profile_id)?;
        if let Some(status) = self.reports {
            scope.override_status(status);
        }
        Ok(())
    }

    async fn do_destroy(&mut self) -> BuildResult {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl MiniService for Webhook {
    type Entity = Profile;

    fn entity_id(entity: &Profile) -> String {
        entity.id.clone()
    }
}

/// Owns one `Webhook` per profile
pub struct WebhookManager {
    pub pool: MiniServiceStore<Webhook>,
    pub profiles: Arc<Mutex<Vec<Profile>>>,
    /// `do_destroy` calls across every webhook this manager created
    pub teardowns: Arc<AtomicU32>,
}

impl WebhookManager {
    pub fn new(name: &str, profiles: Vec<Profile>) -> Self {
        Self {
            pool: MiniServiceStore::new(name),
            profiles: Arc::new(Mutex::new(profiles)),
            teardowns: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn teardown_count(&self) -> u32 {
        self.teardowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Component for WebhookManager {
    async fn do_build(&mut self, scope: &mut BuildScope) -> BuildResult {
        let profiles = self.profiles.lock().unwrap().clone();
        let teardowns = Arc::clone(&self.teardowns);
        let counter = populate(&mut self.pool, profiles, scope.token(), |p: &Profile| {
            Webhook::new(p, &teardowns)
        })
        .await;
        scope.override_status(counter.status());
        Ok(())
    }

    async fn do_destroy(&mut self) -> BuildResult {
        self.pool.destroy_all().await;
        Ok(())
    }

    fn mini_service_count(&self) -> Option<usize> {
        Some(self.pool.len())
    }

    fn mini_service(&self, id: &str) -> Option<Arc<dyn ManagedComponent>> {
        self.pool.managed(id)
    }
}
