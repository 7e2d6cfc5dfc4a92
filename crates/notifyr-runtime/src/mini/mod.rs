//! Mini-services
//!
//! Lightweight sub-components bound 1:1 to an external entity (a profile, an
//! agent, a webhook target). A manager owns the pool, rebuilds it on every
//! pass and reports the aggregate status of its survivors.

pub mod counter;
pub mod store;

pub use counter::StatusCounter;
pub use store::{MiniEntry, MiniServiceStore};

use crate::component::Component;
use crate::lifecycle::ComponentCell;
use notifyr_domain::build::BuildToken;
use notifyr_domain::status::ComponentStatus;
use std::sync::Arc;
use tracing::{debug, warn};

/// A component serving exactly one external entity
pub trait MiniService: Component {
    /// Backing entity
    type Entity: Send + Sync + 'static;

    /// Id of `entity`, used as the mini-service name and pool key
    fn entity_id(entity: &Self::Entity) -> String;
}

/// Run the manager pass over `entities`
///
/// Destroys the previous pool, builds one mini-service per entity under its
/// own lock and pools the survivors. Mini-services ending `Unavailable`,
/// aborting, or clashing with an already pooled id are destroyed and
/// omitted; a `TemporarilyUnavailable` one stays pooled and counts towards
/// the aggregate. The returned counter gives the manager its status:
///
/// ```ignore
/// async fn do_build(&mut self, scope: &mut BuildScope) -> BuildResult {
///     let profiles = self.profiles.list().await.or_failure("listing profiles")?;
///     let counter = populate(&mut self.pool, profiles, scope.token(), Webhook::new).await;
///     scope.override_status(counter.status());
///     Ok(())
/// }
/// ```
pub async fn populate<M, F>(
    store: &mut MiniServiceStore<M>,
    entities: Vec<M::Entity>,
    token: BuildToken,
    mut make: F,
) -> StatusCounter
where
    M: MiniService,
    F: FnMut(&M::Entity) -> M + Send,
{
    store.destroy_all().await;

    let mut counter = StatusCounter::new(entities.len());
    for entity in entities {
        let id = M::entity_id(&entity);
        let cell = ComponentCell::new(id.clone(), make(&entity));
        match cell.build(token).await {
            Ok(report) if report.status != ComponentStatus::Unavailable => {
                if let Err(err) = store.add(Arc::clone(&cell), entity) {
                    warn!(manager = %store.manager(), %id, error = %err, "Mini-service omitted");
                    cell.destroy().await;
                    counter.omit();
                    continue;
                }
                counter.record(report.status);
            }
            Ok(report) => {
                debug!(
                    manager = %store.manager(),
                    %id,
                    status = %report.status,
                    "Mini-service not usable, omitted"
                );
                cell.destroy().await;
                counter.omit();
            }
            Err(err) => {
                warn!(manager = %store.manager(), %id, error = %err, "Mini-service aborted, omitted");
                cell.destroy().await;
                counter.omit();
            }
        }
    }
    counter
}
