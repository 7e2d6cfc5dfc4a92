//! Runtime container
//!
//! Owns every component instance of the process. `start` plans the
//! registry, then constructs and boots each component in plan order, so a
//! dependency has always finished its first build before a dependent's
//! factory runs. After boot the runtime serves typed lookups, ad-hoc
//! rebuilds and destroys (with link propagation), remote state changes and
//! health reports.

use crate::component::Component;
use crate::config::{AbortPolicy, RuntimeConfig};
use crate::constants::ABORT_EXIT_CODE;
use crate::events::{EventBus, LifecycleEvent};
use crate::health::{HealthCheck, HealthResponse};
use crate::lifecycle::{ComponentCell, ManagedComponent, StatusSnapshot};
use crate::links::{LinkOp, LinkPropagator, LinkTopology, PropagationReport};
use crate::pool::BlockingPool;
use crate::registry::descriptor::DescriptorKind;
use crate::registry::{
    ComponentDescriptor, ComponentRegistry, LinkSpec, PlanContext, PlannedComponent,
    SkippedComponent, check_descriptor,
};
use crate::state::StateChange;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use notifyr_domain::build::{BuildReport, BuildToken};
use notifyr_domain::error::{Error, Result};
use notifyr_domain::status::ComponentStatus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

struct Node {
    cell: Arc<dyn ManagedComponent>,
    dependencies: Vec<String>,
    links: Vec<LinkSpec>,
    manager: bool,
}

/// Lookup handle passed to component factories
pub struct Resolver<'a> {
    runtime: &'a Runtime,
    component: &'a str,
}

impl Resolver<'_> {
    /// Name of the component being constructed
    pub fn name(&self) -> &str {
        self.component
    }

    /// Typed handle to an already built dependency
    pub fn get<C: Component>(&self, name: &str) -> Result<Arc<ComponentCell<C>>> {
        self.runtime.get(name)
    }

    /// Untyped handle to an already built dependency
    pub fn component(&self, name: &str) -> Result<Arc<dyn ManagedComponent>> {
        self.runtime.component(name)
    }

    /// Shared blocking pool
    pub fn pool(&self) -> BlockingPool {
        self.runtime.pool.clone()
    }

    /// Plan context of this process
    pub fn context(&self) -> &PlanContext {
        &self.runtime.context
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.runtime.config
    }
}

/// The component container of one process
pub struct Runtime {
    config: RuntimeConfig,
    context: PlanContext,
    nodes: DashMap<String, Node>,
    order: RwLock<Vec<String>>,
    skipped: DashMap<String, SkippedComponent>,
    aliases: HashMap<String, String>,
    events: EventBus,
    pool: BlockingPool,
    boot_reports: Mutex<Vec<BuildReport>>,
    started_at: Instant,
}

impl Runtime {
    /// Plan `registry` and boot every planned component
    ///
    /// Plan errors surface before anything is constructed. A boot pass
    /// ending in `Abort` exits the process under `AbortPolicy::Exit`;
    /// otherwise the components booted so far are shut down and the error
    /// is returned.
    pub async fn start(registry: &ComponentRegistry, config: RuntimeConfig) -> Result<Self> {
        let context = PlanContext::from(&config);
        let plan = registry.plan(&context)?;
        let (steps, skipped, aliases) = plan.into_parts();

        let runtime = Self {
            events: EventBus::new(config.events.capacity),
            pool: BlockingPool::new(config.blocking.max_threads),
            config,
            context,
            nodes: DashMap::new(),
            order: RwLock::new(Vec::with_capacity(steps.len())),
            skipped: skipped.into_iter().map(|s| (s.name.clone(), s)).collect(),
            aliases,
            boot_reports: Mutex::new(Vec::new()),
            started_at: Instant::now(),
        };

        info!(
            components = steps.len(),
            skipped = runtime.skipped.len(),
            mode = %runtime.context.mode,
            "Starting runtime"
        );

        for step in steps {
            if let Err(err) = runtime.boot(step).await {
                runtime.on_abort(&err);
                error!(error = %err, "Boot failed, shutting down booted components");
                runtime.shutdown().await;
                return Err(err);
            }
        }

        info!(
            components = runtime.nodes.len(),
            elapsed_ms = runtime.started_at.elapsed().as_millis() as u64,
            "Runtime started"
        );
        Ok(runtime)
    }

    async fn boot(&self, step: PlannedComponent) -> Result<BuildReport> {
        let PlannedComponent {
            name,
            dependencies,
            links,
            manager,
            factory,
            ..
        } = step;

        let cell = {
            let resolver = Resolver {
                runtime: self,
                component: &name,
            };
            factory(&name, &resolver)?
        };
        cell.attach_events(self.events.clone());

        // the entry reserves the name, so a racing registration loses here
        match self.nodes.entry(name.clone()) {
            Entry::Occupied(_) => return Err(Error::DuplicateComponent { name }),
            Entry::Vacant(slot) => {
                slot.insert(Node {
                    cell: Arc::clone(&cell),
                    dependencies,
                    links,
                    manager,
                });
            }
        }
        write_lock(&self.order).push(name);

        let report = cell.build(BuildToken::BOOT).await?;
        lock(&self.boot_reports).push(report.clone());
        Ok(report)
    }

    /// Abort is process-fatal under `AbortPolicy::Exit`, for boot passes
    /// and later rebuilds alike
    fn on_abort(&self, err: &Error) {
        if !matches!(err, Error::BuildAborted { .. }) {
            return;
        }
        if self.config.abort_policy == AbortPolicy::Exit {
            error!(error = %err, "Build aborted, terminating process");
            std::process::exit(ABORT_EXIT_CODE);
        }
        error!(error = %err, "Build aborted");
    }

    fn check_abort<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.on_abort(err);
        }
        result
    }

    fn resolve_name(&self, name: &str) -> String {
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Untyped handle to a component (abstract names resolve to their target)
    pub fn component(&self, name: &str) -> Result<Arc<dyn ManagedComponent>> {
        let resolved = self.resolve_name(name);
        if let Some(node) = self.nodes.get(&resolved) {
            return Ok(Arc::clone(&node.cell));
        }
        if let Some(skipped) = self.skipped.get(&resolved) {
            return Err(Error::ComponentSkipped {
                name: resolved,
                reason: skipped.reason.clone(),
            });
        }
        Err(Error::not_found(name))
    }

    /// Typed handle to a component
    pub fn get<C: Component>(&self, name: &str) -> Result<Arc<ComponentCell<C>>> {
        self.component(name)?
            .downcast_arc::<ComponentCell<C>>()
            .map_err(|_| Error::TypeMismatch {
                name: self.resolve_name(name),
                expected: std::any::type_name::<C>(),
            })
    }

    /// Current status of a component
    pub async fn status(&self, name: &str) -> Result<ComponentStatus> {
        Ok(self.component(name)?.status().await)
    }

    /// Operator view of a component
    pub async fn snapshot(&self, name: &str) -> Result<StatusSnapshot> {
        Ok(self.component(name)?.snapshot().await)
    }

    /// Operator view of every running component, in boot order
    pub async fn snapshots(&self) -> Vec<StatusSnapshot> {
        let mut snapshots = Vec::new();
        for name in self.order() {
            if let Ok(cell) = self.component(&name) {
                snapshots.push(cell.snapshot().await);
            }
        }
        snapshots
    }

    /// Rebuild `name` with `token`, propagating over build links
    pub async fn rebuild(&self, name: &str, token: BuildToken) -> Result<PropagationReport> {
        let resolved = self.resolve_name(name);
        self.component(&resolved)?;
        let result = LinkPropagator::new(self, LinkOp::Build)
            .run(&resolved, token)
            .await;
        self.check_abort(result)
    }

    /// Destroy `name`, propagating over destroy links
    pub async fn destroy(&self, name: &str) -> Result<PropagationReport> {
        let resolved = self.resolve_name(name);
        self.component(&resolved)?;
        LinkPropagator::new(self, LinkOp::Destroy)
            .run(&resolved, BuildToken::ADMIN)
            .await
    }

    /// Destroy every component in reverse boot order, best effort
    pub async fn shutdown(&self) -> Vec<String> {
        let mut order = self.order();
        order.reverse();
        for name in &order {
            let cell = self.nodes.get(name).map(|n| Arc::clone(&n.cell));
            if let Some(cell) = cell {
                cell.destroy().await;
            }
        }
        info!(components = order.len(), "Runtime shut down");
        order
    }

    /// Register and boot a component after start
    ///
    /// Its dependencies and link targets must already be running. Of two
    /// concurrent registrations under one name, exactly one boots.
    pub async fn register(&self, descriptor: ComponentDescriptor) -> Result<BuildReport> {
        check_descriptor(&descriptor)?;
        let name = descriptor.name().to_string();
        if self.nodes.contains_key(&name) || self.skipped.contains_key(&name) {
            return Err(Error::DuplicateComponent { name });
        }

        let effective = descriptor.effective(&self.context);
        let DescriptorKind::Concrete { factory, manager } = &effective.kind else {
            return Err(Error::configuration(format!(
                "abstract component '{name}' cannot be registered after start"
            )));
        };

        let mut dependencies = Vec::with_capacity(effective.dependencies().len());
        for dependency in effective.dependencies() {
            let resolved = self.resolve_name(dependency);
            if let Some(skipped) = self.skipped.get(&resolved) {
                let reason = format!("depends on skipped component '{}'", skipped.name);
                drop(skipped);
                return Err(self.skip_late(&name, reason));
            }
            if !self.nodes.contains_key(&resolved) {
                return Err(Error::unresolved(&name, dependency));
            }
            dependencies.push(resolved);
        }
        if !effective.condition.holds(&self.context) {
            return Err(self.skip_late(&name, "build condition is false".to_string()));
        }

        let mut links = Vec::with_capacity(effective.links().len());
        for link in effective.links() {
            let mut link = link.clone();
            link.target = self.resolve_name(&link.target);
            if !self.nodes.contains_key(&link.target) {
                return Err(Error::unresolved(&name, &link.target));
            }
            links.push(link);
        }

        info!(component = %name, "Registering component after start");
        let result = self
            .boot(PlannedComponent {
                name,
                type_name: effective.type_name,
                dependencies,
                links,
                manager: *manager,
                factory: factory.clone(),
            })
            .await;
        self.check_abort(result)
    }

    fn skip_late(&self, name: &str, reason: String) -> Error {
        warn!(component = %name, %reason, "Late registration skipped");
        self.skipped.insert(
            name.to_string(),
            SkippedComponent {
                name: name.to_string(),
                reason: reason.clone(),
            },
        );
        Error::ComponentSkipped {
            name: name.to_string(),
            reason,
        }
    }

    /// Apply a remote state change: assign the status, then destroy and/or
    /// build as requested
    ///
    /// With `id` set the change targets that mini-service of the manager
    /// `component`; the pool itself is left as is until the manager's next
    /// pass.
    pub async fn apply_state_change(&self, change: &StateChange) -> Result<Option<BuildReport>> {
        let cell = self.state_change_target(change).await?;
        info!(
            component = %change.component,
            mini_service = ?change.id,
            status = %change.status,
            to_destroy = change.to_destroy,
            to_build = change.to_build,
            "Applying state change"
        );
        cell.set_status(change.status).await;
        if change.to_destroy {
            cell.destroy().await;
        }
        if change.to_build {
            let result = cell.build(change.token()).await;
            return self.check_abort(result).map(Some);
        }
        Ok(None)
    }

    async fn state_change_target(
        &self,
        change: &StateChange,
    ) -> Result<Arc<dyn ManagedComponent>> {
        let cell = self.component(&change.component)?;
        let Some(id) = &change.id else {
            return Ok(cell);
        };
        let is_manager = self
            .nodes
            .get(cell.name())
            .is_some_and(|node| node.manager);
        if !is_manager {
            return Err(Error::NotAManager {
                name: cell.name().to_string(),
            });
        }
        cell.mini_service(id)
            .await
            .ok_or_else(|| Error::MiniServiceNotFound {
                manager: cell.name().to_string(),
                id: id.clone(),
            })
    }

    /// Aggregate health of every component
    pub async fn health(&self) -> HealthResponse {
        let started = Instant::now();
        let mut response = HealthResponse::new();
        for snapshot in self.snapshots().await {
            response = response.add_check(HealthCheck::from_snapshot(&snapshot));
        }
        for skipped in self.skipped() {
            response = response.add_check(HealthCheck::skipped(&skipped));
        }
        response
            .with_response_time(started.elapsed())
            .with_uptime(self.started_at.elapsed())
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// Reports of every boot pass, in boot order
    pub fn boot_reports(&self) -> Vec<BuildReport> {
        lock(&self.boot_reports).clone()
    }

    /// Running component names in boot order
    pub fn order(&self) -> Vec<String> {
        read_lock(&self.order).clone()
    }

    /// Components pruned at plan time or on late registration
    pub fn skipped(&self) -> Vec<SkippedComponent> {
        let mut skipped: Vec<SkippedComponent> =
            self.skipped.iter().map(|e| e.value().clone()).collect();
        skipped.sort_by(|a, b| a.name.cmp(&b.name));
        skipped
    }

    /// Names of the components that manage mini-services
    pub fn managers(&self) -> Vec<String> {
        self.order()
            .into_iter()
            .filter(|name| self.nodes.get(name).is_some_and(|n| n.manager))
            .collect()
    }

    /// Resolved constructor dependencies of `name`
    pub fn dependencies_of(&self, name: &str) -> Result<Vec<String>> {
        let resolved = self.resolve_name(name);
        self.nodes
            .get(&resolved)
            .map(|n| n.dependencies.clone())
            .ok_or_else(|| Error::not_found(name))
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Plan context of this process
    pub fn context(&self) -> &PlanContext {
        &self.context
    }

    /// Shared blocking pool
    pub fn pool(&self) -> &BlockingPool {
        &self.pool
    }
}

impl LinkTopology for Runtime {
    fn links_of(&self, name: &str) -> Vec<LinkSpec> {
        self.nodes
            .get(name)
            .map(|n| n.links.clone())
            .unwrap_or_default()
    }

    fn followers_of(&self, name: &str) -> Vec<(String, LinkSpec)> {
        let mut followers = Vec::new();
        for candidate in self.order() {
            let link = self
                .nodes
                .get(&candidate)
                .and_then(|n| n.links.iter().find(|l| l.target == name).cloned());
            if let Some(link) = link {
                followers.push((candidate, link));
            }
        }
        followers
    }

    fn cell(&self, name: &str) -> Result<Arc<dyn ManagedComponent>> {
        self.component(name)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn read_lock<T>(rw: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(rw: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(|e| e.into_inner())
}
