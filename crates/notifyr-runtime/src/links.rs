//! Link propagation
//!
//! An ad-hoc rebuild or destroy walks link edges: the component's own
//! matching links run first on their targets (depth-first, with the link's
//! token), then the component itself, then every follower that declared a
//! matching link onto it. Each node runs at most once per pass.

use crate::lifecycle::ManagedComponent;
use crate::registry::LinkSpec;
use futures::FutureExt;
use futures::future::BoxFuture;
use notifyr_domain::build::{BuildReport, BuildToken};
use notifyr_domain::error::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Which lifecycle operation a pass propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOp {
    Build,
    Destroy,
}

impl LinkOp {
    fn follows(self, link: &LinkSpec) -> bool {
        match self {
            Self::Build => link.to_build,
            Self::Destroy => link.to_destroy,
        }
    }
}

/// Link graph and components a pass walks over
pub trait LinkTopology: Send + Sync {
    /// Links declared by `name`
    fn links_of(&self, name: &str) -> Vec<LinkSpec>;

    /// Components that declared a link onto `name`, with that link
    fn followers_of(&self, name: &str) -> Vec<(String, LinkSpec)>;

    /// The component registered as `name`
    fn cell(&self, name: &str) -> Result<Arc<dyn ManagedComponent>>;
}

/// What one propagated pass did
#[derive(Debug, Clone, Default)]
pub struct PropagationReport {
    /// Components processed, in order
    pub visited: Vec<String>,
    /// Build reports, in order (build passes only)
    pub reports: Vec<BuildReport>,
}

/// One propagated rebuild or destroy
pub struct LinkPropagator<'a, T: LinkTopology> {
    topology: &'a T,
    op: LinkOp,
    done: HashSet<String>,
    in_progress: Vec<String>,
    report: PropagationReport,
}

impl<'a, T: LinkTopology> LinkPropagator<'a, T> {
    pub fn new(topology: &'a T, op: LinkOp) -> Self {
        Self {
            topology,
            op,
            done: HashSet::new(),
            in_progress: Vec::new(),
            report: PropagationReport::default(),
        }
    }

    /// Propagate from `name`; `token` applies to `name` itself
    pub async fn run(mut self, name: &str, token: BuildToken) -> Result<PropagationReport> {
        self.visit(name.to_string(), token, false).await?;
        Ok(self.report)
    }

    /// A follower still in progress is the node that pulled this one in as a
    /// link target and runs once its targets are done; reaching an
    /// in-progress node through its own links is a cycle.
    fn visit(
        &mut self,
        name: String,
        token: BuildToken,
        as_follower: bool,
    ) -> BoxFuture<'_, Result<()>> {
        async move {
            if self.done.contains(&name) {
                return Ok(());
            }
            if self.in_progress.contains(&name) {
                if as_follower {
                    return Ok(());
                }
                let mut path = self.in_progress.clone();
                path.push(name);
                return Err(Error::LinkCycle {
                    path: path.join(" -> "),
                });
            }
            self.in_progress.push(name.clone());

            for link in self.topology.links_of(&name) {
                if self.op.follows(&link) {
                    self.visit(link.target.clone(), link.token, false).await?;
                }
            }

            let cell = self.topology.cell(&name)?;
            debug!(component = %name, op = ?self.op, %token, "Propagating lifecycle operation");
            match self.op {
                LinkOp::Build => {
                    let report = cell.build(token).await?;
                    self.report.reports.push(report);
                }
                LinkOp::Destroy => cell.destroy().await,
            }
            self.report.visited.push(name.clone());

            self.in_progress.pop();
            self.done.insert(name.clone());

            for (follower, link) in self.topology.followers_of(&name) {
                if self.op.follows(&link) {
                    self.visit(follower, link.token, true).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }
}
