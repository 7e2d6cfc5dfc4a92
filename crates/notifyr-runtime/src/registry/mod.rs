//! Component registry
//!
//! Records descriptors and plans the build order for a process.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`descriptor`] | Descriptors, links, conditions, plan context |
//! | [`plan`] | Mirror substitution, abstract resolution, ordering, pruning |
//! | [`catalog`] | Link-time registration through `linkme` |

pub mod catalog;
pub mod descriptor;
pub mod plan;

pub use catalog::{COMPONENTS, list_registered};
pub use descriptor::{
    AbstractResolver, BuildCondition, ComponentDescriptor, Factory, LinkSpec, PlanContext,
    Predicate,
};
pub use plan::{BuildPlan, PlannedComponent, SkippedComponent};

use notifyr_domain::error::{Error, Result};
use tracing::debug;

/// Ordered set of component descriptors
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    descriptors: Vec<ComponentDescriptor>,
}

impl ComponentRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a descriptor
    ///
    /// Rejects duplicate names, self-dependencies and self-links; the rest of
    /// the graph is validated by [`plan`](Self::plan).
    pub fn register(&mut self, descriptor: ComponentDescriptor) -> Result<&mut Self> {
        check_descriptor(&descriptor)?;
        if self.contains(descriptor.name()) {
            return Err(Error::DuplicateComponent {
                name: descriptor.name().to_string(),
            });
        }
        debug!(component = %descriptor.name(), "Component registered");
        self.descriptors.push(descriptor);
        Ok(self)
    }

    /// Consuming form of [`register`](Self::register)
    pub fn with(mut self, descriptor: ComponentDescriptor) -> Result<Self> {
        self.register(descriptor)?;
        Ok(self)
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.iter().any(|d| d.name() == name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name()).collect()
    }

    /// Number of descriptors
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Plan the build for `ctx`
    pub fn plan(&self, ctx: &PlanContext) -> Result<BuildPlan> {
        plan::build_plan(&self.descriptors, ctx)
    }
}

pub(crate) fn check_descriptor(descriptor: &ComponentDescriptor) -> Result<()> {
    let name = descriptor.name();
    let self_dependency = descriptor.dependencies().iter().any(|d| d == name);
    let self_link = descriptor.links().iter().any(|l| l.target == name);
    if self_dependency || self_link {
        return Err(Error::SelfReference {
            name: name.to_string(),
        });
    }
    if let Some((_, alternate)) = &descriptor.mirror {
        if alternate.dependencies().iter().any(|d| d == name)
            || alternate.links().iter().any(|l| l.target == name)
        {
            return Err(Error::SelfReference {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
