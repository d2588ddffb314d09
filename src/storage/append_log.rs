// Append-log storage backend: every mutation is appended as a JSON record
// to a log file; `save_graph`/`compact` fold the log into a fresh snapshot
// via write-to-temp-then-rename, mirroring the teacher's archival pattern
// in `native_graph_storage.rs` (`persist_nodes`/rotate-via-rename) but
// applied to the whole graph instead of per-node records.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock as SyncRwLock;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument};

use crate::error::{GraphError, Result};
use crate::events::{Event, EventBus};
use crate::model::{Entity, EntityUpdate, KnowledgeGraph, Relation, SnapshotVersion};
use crate::storage::secondary_index::SecondaryIndices;
use crate::storage::{EmbeddingStats, GraphStorage, LowercaseView};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum AppendRecord {
    EntityCreated(Entity),
    EntityUpdated(Entity),
    EntityDeleted { name: String },
    RelationCreated(Relation),
    RelationDeleted { from: String, to: String, relation_type: String },
    ObservationAdded { name: String, observation: String },
    ObservationDeleted { name: String, observation: String },
}

struct State {
    graph: KnowledgeGraph,
    indices: SecondaryIndices,
}

pub struct AppendLogStorage {
    snapshot_path: PathBuf,
    log_path: PathBuf,
    embeddings_path: PathBuf,
    state: SyncRwLock<State>,
    cached: SyncRwLock<Arc<KnowledgeGraph>>,
    embeddings: SyncRwLock<HashMap<String, (Vec<f32>, Option<String>)>>,
    write_lock: AsyncMutex<()>,
    version: AtomicU64,
    events: Arc<EventBus>,
}

impl AppendLogStorage {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| GraphError::storage(format!("creating store dir: {e}")))?;

        let snapshot_path = dir.join("graph.snapshot.json");
        let log_path = dir.join("graph.log");
        let embeddings_path = dir.join("embeddings.json");

        let mut graph = if snapshot_path.exists() {
            let text = fs::read_to_string(&snapshot_path)
                .await
                .map_err(|e| GraphError::storage(format!("reading snapshot: {e}")))?;
            serde_json::from_str(&text)?
        } else {
            KnowledgeGraph::new()
        };

        if log_path.exists() {
            let text = fs::read_to_string(&log_path)
                .await
                .map_err(|e| GraphError::storage(format!("reading log: {e}")))?;
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                let record: AppendRecord = serde_json::from_str(line)?;
                apply_record(&mut graph, record);
            }
        }

        let embeddings = if embeddings_path.exists() {
            let text = fs::read_to_string(&embeddings_path)
                .await
                .map_err(|e| GraphError::storage(format!("reading embeddings: {e}")))?;
            serde_json::from_str(&text)?
        } else {
            HashMap::new()
        };

        let indices = SecondaryIndices::build(&graph);
        let cached = Arc::new(graph.clone());

        Ok(Self {
            snapshot_path,
            log_path,
            embeddings_path,
            state: SyncRwLock::new(State { graph, indices }),
            cached: SyncRwLock::new(cached),
            embeddings: SyncRwLock::new(embeddings),
            write_lock: AsyncMutex::new(()),
            version: AtomicU64::new(0),
            events: Arc::new(EventBus::new()),
        })
    }

    async fn append(&self, record: AppendRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await
            .map_err(|e| GraphError::storage(format!("opening log: {e}")))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| GraphError::storage(format!("appending log: {e}")))?;
        file.flush()
            .await
            .map_err(|e| GraphError::storage(format!("flushing log: {e}")))?;
        Ok(())
    }

    fn refresh_cache(&self) {
        let state = self.state.read();
        *self.cached.write() = Arc::new(state.graph.clone());
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)
            .await
            .map_err(|e| GraphError::storage(format!("writing temp file: {e}")))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| GraphError::storage(format!("renaming temp file: {e}")))?;
        Ok(())
    }

    async fn write_embeddings(&self, map: HashMap<String, (Vec<f32>, Option<String>)>) -> Result<()> {
        let json = serde_json::to_string(&map)?;
        Self::write_atomic(&self.embeddings_path, &json).await
    }
}

fn apply_record(graph: &mut KnowledgeGraph, record: AppendRecord) {
    match record {
        AppendRecord::EntityCreated(entity) => graph.entities.push(entity),
        AppendRecord::EntityUpdated(updated) => {
            if let Some(slot) = graph
                .entities
                .iter_mut()
                .find(|e| e.name == updated.name)
            {
                *slot = updated;
            }
        }
        AppendRecord::EntityDeleted { name } => {
            graph.entities.retain(|e| e.name.as_str() != name);
            graph
                .relations
                .retain(|r| r.from.as_str() != name && r.to.as_str() != name);
        }
        AppendRecord::RelationCreated(relation) => graph.relations.push(relation),
        AppendRecord::RelationDeleted { from, to, relation_type } => {
            graph.relations.retain(|r| {
                !(r.from.as_str() == from && r.to.as_str() == to && r.relation_type.as_str() == relation_type)
            });
        }
        AppendRecord::ObservationAdded { name, observation } => {
            if let Some(entity) = graph.entities.iter_mut().find(|e| e.name.as_str() == name) {
                if let Ok(obs) = crate::types::Observation::new(observation) {
                    entity.observations.push(obs);
                    entity.touch();
                }
            }
        }
        AppendRecord::ObservationDeleted { name, observation } => {
            if let Some(entity) = graph.entities.iter_mut().find(|e| e.name.as_str() == name) {
                entity.observations.retain(|o| o.as_str() != observation);
                entity.touch();
            }
        }
    }
}

#[async_trait]
impl GraphStorage for AppendLogStorage {
    #[instrument(skip(self))]
    async fn load_graph(&self) -> Result<Arc<KnowledgeGraph>> {
        Ok(self.cached.read().clone())
    }

    async fn get_graph_for_mutation(&self) -> Result<KnowledgeGraph> {
        Ok(self.state.read().graph.clone())
    }

    async fn append_entity(&self, entity: Entity) -> Result<()> {
        if self.state.read().indices.names.contains(entity.name.as_str()) {
            return Err(GraphError::duplicate(entity.name.as_str()));
        }
        self.append(AppendRecord::EntityCreated(entity.clone())).await?;
        {
            let mut state = self.state.write();
            state.indices.on_entity_created(&entity);
            state.graph.entities.push(entity.clone());
        }
        self.refresh_cache();
        self.events.publish(Event::EntityCreated { entity });
        Ok(())
    }

    async fn append_relation(&self, relation: Relation) -> Result<()> {
        self.append(AppendRecord::RelationCreated(relation.clone())).await?;
        {
            let mut state = self.state.write();
            state.indices.on_relation_created(relation.clone());
            state.graph.relations.push(relation.clone());
        }
        self.refresh_cache();
        self.events.publish(Event::RelationCreated { relation });
        Ok(())
    }

    async fn update_entity(&self, name: &str, update: EntityUpdate) -> Result<bool> {
        let existing = { self.state.read().indices.names.get(name).cloned() };
        let Some(mut entity) = existing else {
            return Ok(false);
        };
        let old = entity.clone();
        if let Some(entity_type) = update.entity_type {
            entity.entity_type = entity_type;
        }
        if let Some(importance) = update.importance {
            entity.importance = importance;
        }
        if let Some(parent_id) = update.parent_id {
            entity.parent_id = parent_id;
        }
        entity.touch();

        self.append(AppendRecord::EntityUpdated(entity.clone())).await?;
        {
            let mut state = self.state.write();
            state.indices.on_entity_updated(&old, &entity);
            if let Some(slot) = state.graph.entities.iter_mut().find(|e| e.name == entity.name) {
                *slot = entity.clone();
            }
        }
        self.refresh_cache();
        self.events.publish(Event::EntityUpdated { entity });
        Ok(true)
    }

    async fn add_observation(&self, name: &str, observation: String) -> Result<bool> {
        if !self.state.read().indices.names.contains(name) {
            return Ok(false);
        }
        let validated = crate::types::Observation::new(observation.clone())?;
        self.append(AppendRecord::ObservationAdded {
            name: name.to_string(),
            observation: observation.clone(),
        })
        .await?;
        {
            let mut state = self.state.write();
            if let Some(entity) = state.graph.entities.iter_mut().find(|e| e.name.as_str() == name) {
                entity.observations.push(validated);
                entity.touch();
                state.indices.observations.set(name, entity.observations.len());
                state.indices.lowercase.invalidate(name);
            }
        }
        self.refresh_cache();
        self.events.publish(Event::ObservationAdded {
            name: name.to_string(),
            observation,
        });
        Ok(true)
    }

    async fn remove_observation(&self, name: &str, observation: &str) -> Result<bool> {
        if !self.state.read().indices.names.contains(name) {
            return Ok(false);
        }
        self.append(AppendRecord::ObservationDeleted {
            name: name.to_string(),
            observation: observation.to_string(),
        })
        .await?;
        let removed;
        {
            let mut state = self.state.write();
            let before = state
                .graph
                .entities
                .iter()
                .find(|e| e.name.as_str() == name)
                .map(|e| e.observations.len())
                .unwrap_or(0);
            if let Some(entity) = state.graph.entities.iter_mut().find(|e| e.name.as_str() == name) {
                entity.observations.retain(|o| o.as_str() != observation);
                entity.touch();
                removed = entity.observations.len() != before;
                state.indices.observations.set(name, entity.observations.len());
                state.indices.lowercase.invalidate(name);
            } else {
                removed = false;
            }
        }
        self.refresh_cache();
        if removed {
            self.events.publish(Event::ObservationDeleted {
                name: name.to_string(),
                observation: observation.to_string(),
            });
        }
        Ok(removed)
    }

    async fn delete_entity(&self, name: &str) -> Result<bool> {
        let entity = { self.state.read().indices.names.get(name).cloned() };
        let Some(entity) = entity else {
            return Ok(false);
        };
        self.append(AppendRecord::EntityDeleted { name: name.to_string() }).await?;
        {
            let mut state = self.state.write();
            state.indices.on_entity_deleted(&entity);
            state.graph.entities.retain(|e| e.name.as_str() != name);
            state
                .graph
                .relations
                .retain(|r| r.from.as_str() != name && r.to.as_str() != name);
        }
        self.refresh_cache();
        self.events.publish(Event::EntityDeleted { name: name.to_string() });
        Ok(true)
    }

    async fn delete_relation(&self, from: &str, to: &str, relation_type: &str) -> Result<bool> {
        self.append(AppendRecord::RelationDeleted {
            from: from.to_string(),
            to: to.to_string(),
            relation_type: relation_type.to_string(),
        })
        .await?;
        let removed;
        {
            let mut state = self.state.write();
            removed = state.indices.on_relation_deleted(from, to, relation_type);
            state.graph.relations.retain(|r| {
                !(r.from.as_str() == from && r.to.as_str() == to && r.relation_type.as_str() == relation_type)
            });
        }
        self.refresh_cache();
        if removed {
            self.events.publish(Event::RelationDeleted {
                from: from.to_string(),
                to: to.to_string(),
                relation_type: relation_type.to_string(),
            });
        }
        Ok(removed)
    }

    async fn save_graph(&self, graph: KnowledgeGraph) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let json = serde_json::to_string(&graph)?;
        Self::write_atomic(&self.snapshot_path, &json).await?;
        Self::write_atomic(&self.log_path, "").await?;
        {
            let mut state = self.state.write();
            state.indices = SecondaryIndices::build(&graph);
            state.graph = graph;
        }
        self.refresh_cache();
        self.events.publish(Event::GraphSaved);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let graph = self.state.read().graph.clone();
        self.save_graph(graph).await
    }

    async fn compact(&self) -> Result<()> {
        debug!("compacting append log into snapshot");
        self.flush().await
    }

    async fn clear_cache(&self) -> Result<()> {
        let graph = self.state.read().graph.clone();
        *self.cached.write() = Arc::new(graph);
        Ok(())
    }

    fn get_entity_by_name(&self, name: &str) -> Option<Entity> {
        self.state.read().indices.names.get(name).cloned()
    }

    fn has_entity(&self, name: &str) -> bool {
        self.state.read().indices.names.contains(name)
    }

    fn get_entities_by_type(&self, entity_type: &str) -> Vec<Entity> {
        let state = self.state.read();
        state
            .indices
            .types
            .names_for(entity_type)
            .iter()
            .filter_map(|n| state.indices.names.get(n).cloned())
            .collect()
    }

    fn get_entity_types(&self) -> Vec<String> {
        self.state.read().indices.types.types()
    }

    fn get_lowercased(&self, name: &str) -> Option<LowercaseView> {
        let mut state = self.state.write();
        let entity = state.indices.names.get(name)?.clone();
        Some(state.indices.lowercase.get_or_compute(&entity))
    }

    fn get_relations_from(&self, name: &str) -> Vec<Relation> {
        self.state.read().indices.relations.from(name).to_vec()
    }

    fn get_relations_to(&self, name: &str) -> Vec<Relation> {
        self.state.read().indices.relations.to(name).to_vec()
    }

    fn get_relations_for(&self, name: &str) -> (Vec<Relation>, Vec<Relation>) {
        let state = self.state.read();
        (
            state.indices.relations.from(name).to_vec(),
            state.indices.relations.to(name).to_vec(),
        )
    }

    fn has_relations(&self, name: &str) -> bool {
        self.state.read().indices.relations.has_any(name)
    }

    async fn store_embedding(&self, name: &str, vector: Vec<f32>, model: Option<String>) -> Result<()> {
        let map = {
            let mut embeddings = self.embeddings.write();
            embeddings.insert(name.to_string(), (vector, model));
            embeddings.clone()
        };
        self.write_embeddings(map).await
    }

    async fn get_embedding(&self, name: &str) -> Result<Option<Vec<f32>>> {
        Ok(self.embeddings.read().get(name).map(|(v, _)| v.clone()))
    }

    async fn load_all_embeddings(&self) -> Result<Vec<(String, Vec<f32>)>> {
        Ok(self
            .embeddings
            .read()
            .iter()
            .map(|(k, (v, _))| (k.clone(), v.clone()))
            .collect())
    }

    async fn remove_embedding(&self, name: &str) -> Result<bool> {
        let (removed, map) = {
            let mut embeddings = self.embeddings.write();
            let removed = embeddings.remove(name).is_some();
            (removed, embeddings.clone())
        };
        if removed {
            self.write_embeddings(map).await?;
        }
        Ok(removed)
    }

    async fn clear_all_embeddings(&self) -> Result<()> {
        self.embeddings.write().clear();
        self.write_embeddings(HashMap::new()).await
    }

    async fn has_embedding(&self, name: &str) -> Result<bool> {
        Ok(self.embeddings.read().contains_key(name))
    }

    async fn get_embedding_stats(&self) -> Result<EmbeddingStats> {
        let embeddings = self.embeddings.read();
        let dimension = embeddings.values().next().map(|(v, _)| v.len());
        let model = embeddings.values().find_map(|(_, m)| m.clone());
        Ok(EmbeddingStats {
            count: embeddings.len(),
            dimension,
            model,
        })
    }

    fn snapshot_version(&self) -> SnapshotVersion {
        SnapshotVersion(self.version.load(Ordering::SeqCst))
    }

    fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_and_reload_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AppendLogStorage::open(dir.path()).await.unwrap();
        let alice = Entity::new("Alice", "person", ["likes tea"], Vec::<String>::new(), None, None).unwrap();
        storage.append_entity(alice).await.unwrap();
        storage
            .append_relation(Relation::new("Alice", "Bob", "knows").unwrap())
            .await
            .unwrap();

        drop(storage);
        let reopened = AppendLogStorage::open(dir.path()).await.unwrap();
        assert!(reopened.has_entity("Alice"));
        assert_eq!(reopened.get_relations_from("Alice").len(), 1);
    }

    #[tokio::test]
    async fn duplicate_entity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AppendLogStorage::open(dir.path()).await.unwrap();
        let alice = Entity::new("Alice", "person", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap();
        storage.append_entity(alice.clone()).await.unwrap();
        assert!(matches!(
            storage.append_entity(alice).await,
            Err(GraphError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn delete_entity_cascades_relations() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AppendLogStorage::open(dir.path()).await.unwrap();
        storage
            .append_entity(Entity::new("Alice", "person", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap())
            .await
            .unwrap();
        storage
            .append_entity(Entity::new("Bob", "person", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap())
            .await
            .unwrap();
        storage
            .append_relation(Relation::new("Alice", "Bob", "knows").unwrap())
            .await
            .unwrap();

        storage.delete_entity("Alice").await.unwrap();
        assert!(storage.get_relations_to("Bob").is_empty());
    }
}
