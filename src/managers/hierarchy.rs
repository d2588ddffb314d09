// Hierarchy manager: `parentId` nesting, with cycle prevention before a
// parent assignment is committed (spec invariant 13 - "setting an
// entity's parent must not create a cycle"). Walking the proposed parent's
// own ancestor chain and rejecting if the child appears in it is the same
// check the teacher's coordinated-deletion logic uses for dependency
// cycles (coordinated_deletion.rs), applied here to parent pointers
// instead of deletion dependencies.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::model::{Entity, EntityUpdate};
use crate::storage::GraphStorage;

const MAX_CHAIN_LENGTH: usize = 10_000;

pub struct HierarchyManager {
    storage: Arc<dyn GraphStorage>,
}

impl HierarchyManager {
    pub fn new(storage: Arc<dyn GraphStorage>) -> Self {
        Self { storage }
    }

    /// Sets `child`'s parent to `parent`, rejecting the change if it would
    /// create a cycle. `parent = None` always succeeds (detaches the node).
    pub async fn set_parent(&self, child: &str, parent: Option<&str>) -> Result<()> {
        if !self.storage.has_entity(child) {
            return Err(GraphError::not_found(child));
        }

        if let Some(parent_name) = parent {
            if !self.storage.has_entity(parent_name) {
                return Err(GraphError::not_found(parent_name));
            }
            if parent_name == child {
                return Err(GraphError::Cycle {
                    child: child.to_string(),
                    parent: parent_name.to_string(),
                });
            }
            if self.would_cycle(child, parent_name) {
                return Err(GraphError::Cycle {
                    child: child.to_string(),
                    parent: parent_name.to_string(),
                });
            }
        }

        let update = EntityUpdate {
            parent_id: Some(parent.map(|p| crate::types::EntityName::new(p)).transpose()?),
            ..Default::default()
        };
        self.storage.update_entity(child, update).await?;
        Ok(())
    }

    /// True if walking up from `proposed_parent` would eventually reach
    /// `child`, which would make `child -> proposed_parent -> ... -> child`
    /// a cycle once the assignment is made.
    fn would_cycle(&self, child: &str, proposed_parent: &str) -> bool {
        let mut visited = HashSet::new();
        let mut current = proposed_parent.to_string();

        for _ in 0..MAX_CHAIN_LENGTH {
            if current == child {
                return true;
            }
            if !visited.insert(current.clone()) {
                // Pre-existing cycle unrelated to this change; don't block it.
                return false;
            }
            match self
                .storage
                .get_entity_by_name(&current)
                .and_then(|e| e.parent_id.map(|p| p.as_str().to_string()))
            {
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }

    pub fn children_of(&self, name: &str) -> Vec<Entity> {
        self.storage
            .get_entity_types()
            .iter()
            .flat_map(|t| self.storage.get_entities_by_type(t))
            .filter(|e| e.parent_id.as_ref().map(|p| p.as_str()) == Some(name))
            .collect()
    }

    pub fn ancestors_of(&self, name: &str) -> Vec<Entity> {
        let mut ancestors = Vec::new();
        let mut current = self.storage.get_entity_by_name(name).and_then(|e| e.parent_id);
        let mut visited = HashSet::new();
        while let Some(parent_name) = current {
            if !visited.insert(parent_name.as_str().to_string()) {
                break;
            }
            let Some(entity) = self.storage.get_entity_by_name(parent_name.as_str()) else {
                break;
            };
            current = entity.parent_id.clone();
            ancestors.push(entity);
        }
        ancestors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::append_log::AppendLogStorage;

    async fn seeded(names: &[&str]) -> (HierarchyManager, Arc<dyn GraphStorage>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn GraphStorage> = Arc::new(AppendLogStorage::open(dir.path()).await.unwrap());
        for name in names {
            storage
                .append_entity(Entity::new(*name, "node", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap())
                .await
                .unwrap();
        }
        let manager = HierarchyManager::new(storage.clone());
        (manager, storage, dir)
    }

    #[tokio::test]
    async fn sets_and_reads_back_parent() {
        let (manager, storage, _dir) = seeded(&["Root", "Child"]).await;
        manager.set_parent("Child", Some("Root")).await.unwrap();
        assert_eq!(
            storage.get_entity_by_name("Child").unwrap().parent_id.unwrap().as_str(),
            "Root"
        );
    }

    #[tokio::test]
    async fn rejects_self_parenting() {
        let (manager, _storage, _dir) = seeded(&["A"]).await;
        assert!(matches!(
            manager.set_parent("A", Some("A")).await,
            Err(GraphError::Cycle { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_a_cycle_through_an_ancestor() {
        let (manager, _storage, _dir) = seeded(&["A", "B", "C"]).await;
        manager.set_parent("B", Some("A")).await.unwrap();
        manager.set_parent("C", Some("B")).await.unwrap();
        // A -> C would close the loop A -> C -> B -> A? Actually child=A, parent=C: walking up
        // from C reaches B then A, which equals child "A" -> cycle.
        assert!(matches!(
            manager.set_parent("A", Some("C")).await,
            Err(GraphError::Cycle { .. })
        ));
    }

    #[tokio::test]
    async fn children_of_finds_direct_children_only() {
        let (manager, _storage, _dir) = seeded(&["Root", "Child", "Grandchild"]).await;
        manager.set_parent("Child", Some("Root")).await.unwrap();
        manager.set_parent("Grandchild", Some("Child")).await.unwrap();

        let children = manager.children_of("Root");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name.as_str(), "Child");
    }
}
