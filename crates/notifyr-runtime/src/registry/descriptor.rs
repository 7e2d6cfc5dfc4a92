//! Component descriptors
//!
//! A descriptor is everything the registry knows about a component before it
//! exists: its name, how to construct it, what it depends on, and the
//! modifiers that shape the build plan.

use crate::component::Component;
use crate::lifecycle::{ComponentCell, ManagedComponent};
use crate::rotation::CredentialRotator;
use crate::runtime::Resolver;
use notifyr_domain::build::BuildToken;
use notifyr_domain::error::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Constructs the managed cell under the given name, resolving constructor
/// dependencies
pub type Factory =
    Arc<dyn Fn(&str, &Resolver<'_>) -> Result<Arc<dyn ManagedComponent>> + Send + Sync>;

/// Plan-time predicate for `BuildOnlyIf`
pub type Predicate = Arc<dyn Fn(&PlanContext) -> bool + Send + Sync>;

/// Picks the concrete component behind an abstract name
pub type AbstractResolver = Arc<dyn Fn(&PlanContext) -> String + Send + Sync>;

/// Process-level inputs to planning
#[derive(Debug, Clone)]
pub struct PlanContext {
    /// Process mode matched against `Mirror` declarations
    pub mode: String,
    /// Named booleans for `BuildOnlyIf` predicates
    pub flags: HashMap<String, bool>,
}

impl PlanContext {
    /// Context for `mode` without flags
    pub fn new<S: Into<String>>(mode: S) -> Self {
        Self {
            mode: mode.into(),
            flags: HashMap::new(),
        }
    }

    /// Set a flag
    pub fn with_flag<S: Into<String>>(mut self, name: S, value: bool) -> Self {
        self.flags.insert(name.into(), value);
        self
    }

    /// Value of a flag; unset flags are false
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }
}

impl Default for PlanContext {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_MODE)
    }
}

impl From<&crate::config::RuntimeConfig> for PlanContext {
    fn from(config: &crate::config::RuntimeConfig) -> Self {
        Self {
            mode: config.mode.clone(),
            flags: config.flags.clone(),
        }
    }
}

/// Whether a component is part of the plan
#[derive(Clone)]
pub enum BuildCondition {
    /// Always built
    Always,
    /// Fixed at registration
    Flag(bool),
    /// Evaluated once per plan
    Predicate(Predicate),
}

impl BuildCondition {
    pub(crate) fn holds(&self, ctx: &PlanContext) -> bool {
        match self {
            Self::Always => true,
            Self::Flag(value) => *value,
            Self::Predicate(predicate) => predicate(ctx),
        }
    }
}

impl fmt::Debug for BuildCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Flag(value) => write!(f, "Flag({value})"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Directed lifecycle propagation edge (source -> target)
///
/// When the source is rebuilt or destroyed ad hoc, the target is processed
/// first with `token`; when the target is, the source follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    pub target: String,
    pub to_build: bool,
    pub to_destroy: bool,
    pub token: BuildToken,
}

impl LinkSpec {
    /// Rebuild link onto `target` using `BuildToken::LINK`
    pub fn new<S: Into<String>>(target: S) -> Self {
        Self {
            target: target.into(),
            to_build: true,
            to_destroy: false,
            token: BuildToken::LINK,
        }
    }

    /// Propagate rebuilds
    pub fn to_build(mut self, value: bool) -> Self {
        self.to_build = value;
        self
    }

    /// Propagate destroys
    pub fn to_destroy(mut self, value: bool) -> Self {
        self.to_destroy = value;
        self
    }

    /// Token used for the propagated pass
    pub fn with_token(mut self, token: BuildToken) -> Self {
        self.token = token;
        self
    }
}

#[derive(Clone)]
pub(crate) enum DescriptorKind {
    Concrete { factory: Factory, manager: bool },
    Abstract { resolver: AbstractResolver },
}

/// Registration record of one component
#[derive(Clone)]
pub struct ComponentDescriptor {
    pub(crate) name: String,
    pub(crate) type_name: &'static str,
    pub(crate) kind: DescriptorKind,
    pub(crate) dependencies: Vec<String>,
    pub(crate) links: Vec<LinkSpec>,
    pub(crate) implements: Vec<String>,
    pub(crate) condition: BuildCondition,
    pub(crate) mirror: Option<(String, Box<ComponentDescriptor>)>,
}

impl ComponentDescriptor {
    fn concrete<S: Into<String>>(name: S, type_name: &'static str, factory: Factory) -> Self {
        Self {
            name: name.into(),
            type_name,
            kind: DescriptorKind::Concrete {
                factory,
                manager: false,
            },
            dependencies: Vec::new(),
            links: Vec::new(),
            implements: Vec::new(),
            condition: BuildCondition::Always,
            mirror: None,
        }
    }

    /// Describe a component constructed by `factory`
    pub fn of<C, S, F>(name: S, factory: F) -> Self
    where
        C: Component,
        S: Into<String>,
        F: Fn(&Resolver<'_>) -> Result<C> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |name: &str, resolver: &Resolver<'_>| {
            let component = factory(resolver)?;
            Ok(ComponentCell::new(name, component) as Arc<dyn ManagedComponent>)
        });
        Self::concrete(name, std::any::type_name::<C>(), factory)
    }

    /// Describe a credential-rotating component; its timer is armed after
    /// every usable build
    pub fn rotating<C, S, F>(name: S, factory: F) -> Self
    where
        C: CredentialRotator,
        S: Into<String>,
        F: Fn(&Resolver<'_>) -> Result<C> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |name: &str, resolver: &Resolver<'_>| {
            let component = factory(resolver)?;
            Ok(ComponentCell::rotating(name, component) as Arc<dyn ManagedComponent>)
        });
        Self::concrete(name, std::any::type_name::<C>(), factory)
    }

    /// Describe an abstract name resolved to a concrete component at plan time
    pub fn abstract_component<S, F>(name: S, resolver: F) -> Self
    where
        S: Into<String>,
        F: Fn(&PlanContext) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            type_name: "abstract",
            kind: DescriptorKind::Abstract {
                resolver: Arc::new(resolver),
            },
            dependencies: Vec::new(),
            links: Vec::new(),
            implements: Vec::new(),
            condition: BuildCondition::Always,
            mirror: None,
        }
    }

    /// Constructor dependency, built before this component
    pub fn depends_on<S: Into<String>>(mut self, name: S) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Lifecycle propagation edge
    pub fn link(mut self, link: LinkSpec) -> Self {
        self.links.push(link);
        self
    }

    /// Declare that this component can stand in for `abstract_name`
    pub fn implements<S: Into<String>>(mut self, abstract_name: S) -> Self {
        self.implements.push(abstract_name.into());
        self
    }

    /// Mark as owner of a mini-service pool
    pub fn manager(mut self) -> Self {
        if let DescriptorKind::Concrete { manager, .. } = &mut self.kind {
            *manager = true;
        }
        self
    }

    /// Include in the plan only when `value` is true
    pub fn build_only_if(mut self, value: bool) -> Self {
        self.condition = BuildCondition::Flag(value);
        self
    }

    /// Include in the plan only when `predicate` holds
    pub fn build_only_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PlanContext) -> bool + Send + Sync + 'static,
    {
        self.condition = BuildCondition::Predicate(Arc::new(predicate));
        self
    }

    /// Use `alternate` instead of this descriptor when the process runs in `mode`
    pub fn mirror<S: Into<String>>(mut self, mode: S, alternate: ComponentDescriptor) -> Self {
        self.mirror = Some((mode.into(), Box::new(alternate)));
        self
    }

    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared constructor dependencies
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Declared links
    pub fn links(&self) -> &[LinkSpec] {
        &self.links
    }

    /// Whether this is an abstract name
    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, DescriptorKind::Abstract { .. })
    }

    /// Whether this component manages mini-services
    pub fn is_manager(&self) -> bool {
        matches!(self.kind, DescriptorKind::Concrete { manager: true, .. })
    }

    /// Effective descriptor for `ctx` after mirror substitution
    ///
    /// The alternate keeps the original name so dependents are unaffected.
    pub(crate) fn effective(&self, ctx: &PlanContext) -> ComponentDescriptor {
        match &self.mirror {
            Some((mode, alternate)) if *mode == ctx.mode => {
                let mut alternate = (**alternate).clone();
                alternate.name = self.name.clone();
                alternate.mirror = None;
                alternate
            }
            _ => self.clone(),
        }
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("abstract", &self.is_abstract())
            .field("manager", &self.is_manager())
            .field("dependencies", &self.dependencies)
            .field("links", &self.links)
            .field("implements", &self.implements)
            .field("condition", &self.condition)
            .field("mirror", &self.mirror.as_ref().map(|(mode, _)| mode))
            .finish()
    }
}
