// Transaction manager: applies a batch of operations atomically against
// any `GraphStorage` backend. Grounded on the teacher's `contracts::Transaction`
// / `wrappers::SafeTransaction` pattern, but rollback is implemented
// generically (snapshot-before, replace-on-failure via `save_graph`)
// instead of backend-specific undo logs, so it works identically over the
// append-log and SQL backends.

use std::sync::Arc;

use crate::error::Result;
use crate::model::{Entity, EntityUpdate, Relation};
use crate::storage::GraphStorage;

/// A single step in a transaction. Mirrors the subset of `GraphStorage`
/// mutations that make sense to batch.
pub enum Operation {
    CreateEntity(Entity),
    CreateRelation(Relation),
    UpdateEntity { name: String, update: EntityUpdate },
    AddObservation { name: String, observation: String },
    RemoveObservation { name: String, observation: String },
    DeleteEntity(String),
    DeleteRelation { from: String, to: String, relation_type: String },
}

/// Applies `operations` against `storage` in order. On the first failure,
/// every already-applied operation is undone by restoring the
/// pre-transaction snapshot, and the triggering error is returned.
pub struct TransactionManager {
    storage: Arc<dyn GraphStorage>,
}

impl TransactionManager {
    pub fn new(storage: Arc<dyn GraphStorage>) -> Self {
        Self { storage }
    }

    pub async fn run(&self, operations: Vec<Operation>) -> Result<()> {
        let before = self.storage.get_graph_for_mutation().await?;

        for op in operations {
            let outcome = self.apply(op).await;
            if let Err(err) = outcome {
                self.storage.save_graph(before).await?;
                return Err(err);
            }
        }
        Ok(())
    }

    async fn apply(&self, op: Operation) -> Result<()> {
        match op {
            Operation::CreateEntity(entity) => self.storage.append_entity(entity).await,
            Operation::CreateRelation(relation) => self.storage.append_relation(relation).await,
            Operation::UpdateEntity { name, update } => {
                self.storage.update_entity(&name, update).await.map(|_| ())
            }
            Operation::AddObservation { name, observation } => {
                self.storage.add_observation(&name, observation).await.map(|_| ())
            }
            Operation::RemoveObservation { name, observation } => self
                .storage
                .remove_observation(&name, &observation)
                .await
                .map(|_| ()),
            Operation::DeleteEntity(name) => self.storage.delete_entity(&name).await.map(|_| ()),
            Operation::DeleteRelation { from, to, relation_type } => self
                .storage
                .delete_relation(&from, &to, &relation_type)
                .await
                .map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::append_log::AppendLogStorage;

    #[tokio::test]
    async fn failed_operation_rolls_back_the_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn GraphStorage> = Arc::new(AppendLogStorage::open(dir.path()).await.unwrap());
        let manager = TransactionManager::new(storage.clone());

        let alice = Entity::new("Alice", "person", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap();
        let duplicate_alice = Entity::new("Alice", "person", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap();

        let ops = vec![
            Operation::CreateEntity(Entity::new("Bob", "person", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap()),
            Operation::CreateEntity(alice),
            Operation::CreateEntity(duplicate_alice),
        ];

        let result = manager.run(ops).await;
        assert!(result.is_err());
        assert!(!storage.has_entity("Bob"));
        assert!(!storage.has_entity("Alice"));
    }

    #[tokio::test]
    async fn successful_batch_commits_all_operations() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn GraphStorage> = Arc::new(AppendLogStorage::open(dir.path()).await.unwrap());
        let manager = TransactionManager::new(storage.clone());

        let ops = vec![
            Operation::CreateEntity(Entity::new("Alice", "person", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap()),
            Operation::CreateEntity(Entity::new("Bob", "person", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap()),
            Operation::CreateRelation(Relation::new("Alice", "Bob", "knows").unwrap()),
        ];

        manager.run(ops).await.unwrap();
        assert!(storage.has_entity("Alice"));
        assert!(storage.has_entity("Bob"));
        assert_eq!(storage.get_relations_from("Alice").len(), 1);
    }
}
