// Entity manager: the public surface for entity CRUD, built directly over
// the storage contract (spec 4.1, 4.6). One thin layer per concern, in the
// style of the teacher's per-concern `services/*_service.rs` split.

use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::model::{Entity, EntityUpdate};
use crate::search::filter::{paginate, EntityFilter, Pagination};
use crate::storage::GraphStorage;

pub struct EntityManager {
    storage: Arc<dyn GraphStorage>,
}

impl EntityManager {
    pub fn new(storage: Arc<dyn GraphStorage>) -> Self {
        Self { storage }
    }

    pub async fn create(&self, entity: Entity) -> Result<()> {
        self.storage.append_entity(entity).await
    }

    pub fn get(&self, name: &str) -> Result<Entity> {
        self.storage
            .get_entity_by_name(name)
            .ok_or_else(|| GraphError::not_found(name))
    }

    pub async fn update(&self, name: &str, update: EntityUpdate) -> Result<()> {
        if !self.storage.update_entity(name, update).await? {
            return Err(GraphError::not_found(name));
        }
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        if !self.storage.delete_entity(name).await? {
            return Err(GraphError::not_found(name));
        }
        Ok(())
    }

    pub fn list_by_type(&self, entity_type: &str) -> Vec<Entity> {
        self.storage.get_entities_by_type(entity_type)
    }

    pub fn types(&self) -> Vec<String> {
        self.storage.get_entity_types()
    }

    /// Applies `filter` to every known entity (scanning by type when the
    /// filter names one, the full set otherwise) and paginates the result.
    pub fn find(&self, filter: &EntityFilter, pagination: Pagination) -> Vec<Entity> {
        let candidates = match &filter.entity_type {
            Some(entity_type) => self.storage.get_entities_by_type(entity_type),
            None => self
                .storage
                .get_entity_types()
                .iter()
                .flat_map(|t| self.storage.get_entities_by_type(t))
                .collect(),
        };
        let matched: Vec<Entity> = candidates.into_iter().filter(|e| filter.matches(e)).collect();
        paginate(matched, pagination)
    }
}
