//! Per-manager pool of mini-services

use super::MiniService;
use crate::lifecycle::{ComponentCell, ManagedComponent};
use notifyr_domain::build::{BuildReport, BuildToken};
use notifyr_domain::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A pooled mini-service and the entity it serves
pub struct MiniEntry<M: MiniService> {
    entity: M::Entity,
    cell: Arc<ComponentCell<M>>,
}

impl<M: MiniService> MiniEntry<M> {
    /// Entity id
    pub fn id(&self) -> &str {
        self.cell.name()
    }

    /// Backing entity as it was when the mini-service was built
    pub fn entity(&self) -> &M::Entity {
        &self.entity
    }

    /// The mini-service
    pub fn cell(&self) -> &Arc<ComponentCell<M>> {
        &self.cell
    }
}

/// Insertion-ordered pool keyed by entity id
///
/// Lives inside the manager component, so every mutation happens under the
/// manager's writer lock. Lookups are O(1).
pub struct MiniServiceStore<M: MiniService> {
    manager: String,
    order: Vec<String>,
    entries: HashMap<String, MiniEntry<M>>,
}

impl<M: MiniService> MiniServiceStore<M> {
    /// Empty pool owned by `manager`
    pub fn new<S: Into<String>>(manager: S) -> Self {
        Self {
            manager: manager.into(),
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    /// Owning manager
    pub fn manager(&self) -> &str {
        &self.manager
    }

    /// Evict every entry, returning the evicted mini-services in order
    pub fn clear(&mut self) -> Vec<Arc<ComponentCell<M>>> {
        let mut entries = std::mem::take(&mut self.entries);
        std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|id| entries.remove(&id).map(|e| e.cell))
            .collect()
    }

    /// Evict and destroy every entry, in insertion order
    ///
    /// Managers call this from `do_destroy` and before repopulating.
    pub async fn destroy_all(&mut self) -> usize {
        let evicted = self.clear();
        for cell in &evicted {
            cell.destroy().await;
        }
        evicted.len()
    }

    /// Handle to the mini-service serving `id` for runtime-level operations
    pub fn managed(&self, id: &str) -> Option<Arc<dyn ManagedComponent>> {
        self.entries
            .get(id)
            .map(|e| Arc::clone(&e.cell) as Arc<dyn ManagedComponent>)
    }

    /// Pool a built mini-service under its name
    pub fn add(&mut self, cell: Arc<ComponentCell<M>>, entity: M::Entity) -> Result<()> {
        let id = cell.name().to_string();
        if self.entries.contains_key(&id) {
            return Err(Error::MiniServiceAlreadyExists {
                manager: self.manager.clone(),
                id,
            });
        }
        self.order.push(id.clone());
        self.entries.insert(id, MiniEntry { entity, cell });
        Ok(())
    }

    /// Mini-service serving entity `id`
    pub fn get(&self, id: &str) -> Result<Arc<ComponentCell<M>>> {
        self.entries
            .get(id)
            .map(|e| Arc::clone(&e.cell))
            .ok_or_else(|| Error::MiniServiceNotFound {
                manager: self.manager.clone(),
                id: id.to_string(),
            })
    }

    /// Entity served by `id`
    pub fn entity(&self, id: &str) -> Option<&M::Entity> {
        self.entries.get(id).map(|e| &e.entity)
    }

    /// Whether `id` is pooled
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Evict one entry
    pub fn remove(&mut self, id: &str) -> Option<Arc<ComponentCell<M>>> {
        let entry = self.entries.remove(id)?;
        self.order.retain(|o| o != id);
        Some(entry.cell)
    }

    /// Rebuild a single mini-service in place
    pub async fn rebuild(&self, id: &str, token: BuildToken) -> Result<BuildReport> {
        self.get(id)?.build(token).await
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &MiniEntry<M>> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Ids in insertion order
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Count entries matching `predicate` without collecting them
    pub fn filter_count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&MiniEntry<M>) -> bool,
    {
        self.entries.values().filter(|e| predicate(e)).count()
    }

    /// Number of pooled mini-services
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
