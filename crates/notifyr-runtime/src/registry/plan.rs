//! Build planning
//!
//! Turns the registered descriptors into a topologically ordered list of
//! components to construct for one process. Planning is pure: nothing is
//! instantiated and every declaration error surfaces before any component
//! exists.

use super::descriptor::{ComponentDescriptor, DescriptorKind, Factory, LinkSpec, PlanContext};
use notifyr_domain::build::BuildOutcome;
use notifyr_domain::error::{Error, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// One component to construct and build
#[derive(Clone)]
pub struct PlannedComponent {
    pub(crate) name: String,
    pub(crate) type_name: &'static str,
    pub(crate) dependencies: Vec<String>,
    pub(crate) links: Vec<LinkSpec>,
    pub(crate) manager: bool,
    pub(crate) factory: Factory,
}

impl PlannedComponent {
    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved constructor dependencies
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Resolved links onto planned components
    pub fn links(&self) -> &[LinkSpec] {
        &self.links
    }

    /// Whether the component manages mini-services
    pub fn is_manager(&self) -> bool {
        self.manager
    }
}

impl fmt::Debug for PlannedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedComponent")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("dependencies", &self.dependencies)
            .field("links", &self.links)
            .field("manager", &self.manager)
            .finish()
    }
}

/// A component pruned by `BuildOnlyIf`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedComponent {
    pub name: String,
    pub reason: String,
}

impl SkippedComponent {
    /// Pruning is reported as a skip, never as a failure
    pub fn outcome(&self) -> BuildOutcome {
        BuildOutcome::Skip
    }
}

/// Ordered build plan for one process
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    steps: Vec<PlannedComponent>,
    skipped: Vec<SkippedComponent>,
    aliases: HashMap<String, String>,
}

impl BuildPlan {
    /// Components in build order, dependencies first
    pub fn steps(&self) -> &[PlannedComponent] {
        &self.steps
    }

    /// Names in build order
    pub fn order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Pruned components
    pub fn skipped(&self) -> &[SkippedComponent] {
        &self.skipped
    }

    /// Abstract name -> concrete name
    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }

    /// Position of `name` in the build order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    /// Number of components to build
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing will be built
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Vec<PlannedComponent>,
        Vec<SkippedComponent>,
        HashMap<String, String>,
    ) {
        (self.steps, self.skipped, self.aliases)
    }
}

struct Node<'a> {
    descriptor: &'a ComponentDescriptor,
    factory: Factory,
    manager: bool,
    dependencies: Vec<String>,
    links: Vec<LinkSpec>,
}

/// Plan `descriptors` (registration order) for `ctx`
pub(crate) fn build_plan(descriptors: &[ComponentDescriptor], ctx: &PlanContext) -> Result<BuildPlan> {
    let effective: Vec<ComponentDescriptor> =
        descriptors.iter().map(|d| d.effective(ctx)).collect();

    let concrete: HashMap<&str, &ComponentDescriptor> = effective
        .iter()
        .filter(|d| !d.is_abstract())
        .map(|d| (d.name.as_str(), d))
        .collect();

    let aliases = resolve_abstracts(&effective, &concrete, ctx)?;

    let mut nodes = Vec::with_capacity(concrete.len());
    for descriptor in &effective {
        let DescriptorKind::Concrete { factory, manager } = &descriptor.kind else {
            continue;
        };
        let resolve = |target: &str| -> Result<String> {
            let resolved = aliases
                .get(target)
                .cloned()
                .unwrap_or_else(|| target.to_string());
            if !concrete.contains_key(resolved.as_str()) {
                return Err(Error::unresolved(&descriptor.name, target));
            }
            if resolved == descriptor.name {
                return Err(Error::SelfReference {
                    name: descriptor.name.clone(),
                });
            }
            Ok(resolved)
        };

        let mut dependencies = Vec::with_capacity(descriptor.dependencies.len());
        for dependency in &descriptor.dependencies {
            let resolved = resolve(dependency)?;
            if !dependencies.contains(&resolved) {
                dependencies.push(resolved);
            }
        }
        let mut links = Vec::with_capacity(descriptor.links.len());
        for link in &descriptor.links {
            let mut link = link.clone();
            link.target = resolve(&link.target)?;
            links.push(link);
        }

        nodes.push(Node {
            descriptor,
            factory: factory.clone(),
            manager: *manager,
            dependencies,
            links,
        });
    }

    let order = topological_order(&nodes)?;

    // Conditions first so every predicate runs exactly once
    let conditions: Vec<bool> = nodes
        .iter()
        .map(|n| n.descriptor.condition.holds(ctx))
        .collect();

    let mut pruned: HashSet<&str> = HashSet::new();
    let mut skipped = Vec::new();
    for &i in &order {
        let node = &nodes[i];
        let reason = if !conditions[i] {
            Some("build condition is false".to_string())
        } else {
            node.dependencies
                .iter()
                .find(|d| pruned.contains(d.as_str()))
                .map(|d| format!("depends on skipped component '{d}'"))
        };
        if let Some(reason) = reason {
            debug!(component = %node.descriptor.name, %reason, "Component pruned from plan");
            pruned.insert(node.descriptor.name.as_str());
            skipped.push(SkippedComponent {
                name: node.descriptor.name.clone(),
                reason,
            });
        }
    }

    let steps = order
        .iter()
        .map(|&i| &nodes[i])
        .filter(|n| !pruned.contains(n.descriptor.name.as_str()))
        .map(|n| PlannedComponent {
            name: n.descriptor.name.clone(),
            type_name: n.descriptor.type_name,
            dependencies: n.dependencies.clone(),
            links: n
                .links
                .iter()
                .filter(|l| !pruned.contains(l.target.as_str()))
                .cloned()
                .collect(),
            manager: n.manager,
            factory: n.factory.clone(),
        })
        .collect::<Vec<_>>();

    debug!(
        components = steps.len(),
        skipped = skipped.len(),
        mode = %ctx.mode,
        "Build plan ready"
    );

    Ok(BuildPlan {
        steps,
        skipped,
        aliases,
    })
}

fn resolve_abstracts(
    effective: &[ComponentDescriptor],
    concrete: &HashMap<&str, &ComponentDescriptor>,
    ctx: &PlanContext,
) -> Result<HashMap<String, String>> {
    let mut aliases = HashMap::new();
    for descriptor in effective {
        let DescriptorKind::Abstract { resolver } = &descriptor.kind else {
            continue;
        };
        let target = resolver(ctx);
        let Some(candidate) = concrete.get(target.as_str()) else {
            return Err(Error::AbstractResolution {
                name: descriptor.name.clone(),
                message: format!("resolved to unknown component '{target}'"),
            });
        };
        if !candidate.implements.iter().any(|a| *a == descriptor.name) {
            return Err(Error::AbstractResolution {
                name: descriptor.name.clone(),
                message: format!("'{target}' does not implement it"),
            });
        }
        aliases.insert(descriptor.name.clone(), target);
    }
    Ok(aliases)
}

/// Kahn's algorithm over dependencies and links, always taking the earliest
/// registered ready node
fn topological_order(nodes: &[Node<'_>]) -> Result<Vec<usize>> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.descriptor.name.as_str(), i))
        .collect();

    let prerequisites: Vec<Vec<usize>> = nodes
        .iter()
        .map(|n| {
            let mut edges: Vec<usize> = n
                .dependencies
                .iter()
                .chain(n.links.iter().map(|l| &l.target))
                .filter_map(|name| index.get(name.as_str()).copied())
                .collect();
            edges.sort_unstable();
            edges.dedup();
            edges
        })
        .collect();

    let mut placed = vec![false; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    while order.len() < nodes.len() {
        let ready = (0..nodes.len())
            .find(|&i| !placed[i] && prerequisites[i].iter().all(|&p| placed[p]));
        match ready {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => {
                let cycle = find_cycle(&prerequisites, &placed);
                return Err(Error::circular(
                    cycle.iter().map(|&i| nodes[i].descriptor.name.as_str()),
                ));
            }
        }
    }
    Ok(order)
}

/// Every unplaced node still has an unplaced prerequisite, so following them
/// from any unplaced node must revisit one
fn find_cycle(prerequisites: &[Vec<usize>], placed: &[bool]) -> Vec<usize> {
    let Some(start) = placed.iter().position(|p| !p) else {
        return Vec::new();
    };
    let mut path = vec![start];
    let mut current = start;
    loop {
        let Some(&next) = prerequisites[current].iter().find(|&&p| !placed[p]) else {
            return path;
        };
        if let Some(at) = path.iter().position(|&n| n == next) {
            let mut cycle = path.split_off(at);
            cycle.push(next);
            return cycle;
        }
        path.push(next);
        current = next;
    }
}
