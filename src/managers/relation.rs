// Relation manager: create/delete and lookups over directed relations
// (spec 4.1, 4.3).

use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::model::Relation;
use crate::storage::GraphStorage;

pub struct RelationManager {
    storage: Arc<dyn GraphStorage>,
}

impl RelationManager {
    pub fn new(storage: Arc<dyn GraphStorage>) -> Self {
        Self { storage }
    }

    pub async fn create(&self, relation: Relation) -> Result<()> {
        self.storage.append_relation(relation).await
    }

    pub async fn delete(&self, from: &str, to: &str, relation_type: &str) -> Result<()> {
        if !self.storage.delete_relation(from, to, relation_type).await? {
            return Err(GraphError::not_found(format!("{from} -{relation_type}-> {to}")));
        }
        Ok(())
    }

    pub fn outgoing(&self, name: &str) -> Vec<Relation> {
        self.storage.get_relations_from(name)
    }

    pub fn incoming(&self, name: &str) -> Vec<Relation> {
        self.storage.get_relations_to(name)
    }

    pub fn all_for(&self, name: &str) -> (Vec<Relation>, Vec<Relation>) {
        self.storage.get_relations_for(name)
    }

    pub fn has_any(&self, name: &str) -> bool {
        self.storage.has_relations(name)
    }
}
