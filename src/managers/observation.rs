// Observation manager: append/remove observation text on an entity (spec
// 3, 4.1).

use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::storage::GraphStorage;

pub struct ObservationManager {
    storage: Arc<dyn GraphStorage>,
}

impl ObservationManager {
    pub fn new(storage: Arc<dyn GraphStorage>) -> Self {
        Self { storage }
    }

    pub async fn add(&self, name: &str, observation: String) -> Result<()> {
        if !self.storage.add_observation(name, observation).await? {
            return Err(GraphError::not_found(name));
        }
        Ok(())
    }

    pub async fn remove(&self, name: &str, observation: &str) -> Result<bool> {
        if !self.storage.has_entity(name) {
            return Err(GraphError::not_found(name));
        }
        self.storage.remove_observation(name, observation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;
    use crate::storage::append_log::AppendLogStorage;

    #[tokio::test]
    async fn add_and_remove_observation() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn GraphStorage> = Arc::new(AppendLogStorage::open(dir.path()).await.unwrap());
        storage
            .append_entity(Entity::new("Alice", "person", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap())
            .await
            .unwrap();

        let manager = ObservationManager::new(storage.clone());
        manager.add("Alice", "likes tea".to_string()).await.unwrap();
        assert_eq!(storage.get_entity_by_name("Alice").unwrap().observations.len(), 1);

        let removed = manager.remove("Alice", "likes tea").await.unwrap();
        assert!(removed);
        assert_eq!(storage.get_entity_by_name("Alice").unwrap().observations.len(), 0);
    }

    #[tokio::test]
    async fn add_to_missing_entity_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn GraphStorage> = Arc::new(AppendLogStorage::open(dir.path()).await.unwrap());
        let manager = ObservationManager::new(storage);
        assert!(matches!(
            manager.add("Ghost", "x".to_string()).await,
            Err(GraphError::NotFound(_))
        ));
    }
}
