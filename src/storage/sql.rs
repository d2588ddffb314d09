// Embedded SQL storage backend: SQLite via `rusqlite` with an FTS5 virtual
// table mirroring each entity's `document_text()`. Grounded on the pack's
// `zeroaltitude-vestige` sqlite+FTS5 migration pattern (the teacher itself
// only carries a Postgres-only `sqlx` dependency, which is networked and
// has no bundled full-text index - see DESIGN.md for the substitution
// rationale) plus the teacher's `file_storage.rs` shape: one struct,
// `tokio::sync` guards around blocking calls, secondary indices rebuilt on
// open.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock as SyncRwLock;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex as AsyncMutex;
use tracing::instrument;

use crate::error::{GraphError, Result};
use crate::events::{Event, EventBus};
use crate::model::{Entity, EntityUpdate, KnowledgeGraph, Relation, SnapshotVersion};
use crate::storage::secondary_index::SecondaryIndices;
use crate::storage::{EmbeddingStats, GraphStorage, LowercaseView};
use crate::types::{EntityName, EntityType, Importance, Observation, RelationType, Tag, TimestampPair};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    name TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    observations TEXT NOT NULL,
    tags TEXT NOT NULL,
    importance INTEGER,
    parent_id TEXT,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS relations (
    "from" TEXT NOT NULL,
    "to" TEXT NOT NULL,
    relation_type TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    PRIMARY KEY ("from", "to", relation_type),
    FOREIGN KEY ("from") REFERENCES entities(name) ON DELETE CASCADE,
    FOREIGN KEY ("to") REFERENCES entities(name) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS embeddings (
    name TEXT PRIMARY KEY REFERENCES entities(name) ON DELETE CASCADE,
    vector BLOB NOT NULL,
    model TEXT
);

CREATE VIRTUAL TABLE IF NOT EXISTS entities_fts USING fts5(
    name, entity_type, observations, content=''
);
"#;

struct State {
    graph: KnowledgeGraph,
    indices: SecondaryIndices,
}

pub struct SqlStorage {
    conn: AsyncMutex<Connection>,
    state: SyncRwLock<State>,
    cached: SyncRwLock<Arc<KnowledgeGraph>>,
    version: AtomicU64,
    events: Arc<EventBus>,
}

impl SqlStorage {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;

        let graph = load_graph_from_conn(&conn)?;
        let indices = SecondaryIndices::build(&graph);
        let cached = Arc::new(graph.clone());

        Ok(Self {
            conn: AsyncMutex::new(conn),
            state: SyncRwLock::new(State { graph, indices }),
            cached: SyncRwLock::new(cached),
            version: AtomicU64::new(0),
            events: Arc::new(EventBus::new()),
        })
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: AsyncMutex::new(conn),
            state: SyncRwLock::new(State {
                graph: KnowledgeGraph::new(),
                indices: SecondaryIndices::default(),
            }),
            cached: SyncRwLock::new(Arc::new(KnowledgeGraph::new())),
            version: AtomicU64::new(0),
            events: Arc::new(EventBus::new()),
        })
    }

    fn refresh_cache(&self) {
        let state = self.state.read();
        *self.cached.write() = Arc::new(state.graph.clone());
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

fn load_graph_from_conn(conn: &Connection) -> Result<KnowledgeGraph> {
    let mut graph = KnowledgeGraph::new();

    let mut stmt = conn.prepare(
        "SELECT name, entity_type, observations, tags, importance, parent_id, created_at, last_modified FROM entities",
    )?;
    let rows = stmt.query_map([], row_to_entity)?;
    for row in rows {
        graph.entities.push(row?);
    }

    let mut stmt = conn.prepare(
        "SELECT \"from\", \"to\", relation_type, created_at, last_modified FROM relations",
    )?;
    let rows = stmt.query_map([], row_to_relation)?;
    for row in rows {
        graph.relations.push(row?);
    }

    Ok(graph)
}

fn row_to_entity(row: &rusqlite::Row) -> rusqlite::Result<Entity> {
    let name: String = row.get(0)?;
    let entity_type: String = row.get(1)?;
    let observations_json: String = row.get(2)?;
    let tags_json: String = row.get(3)?;
    let importance: Option<u8> = row.get(4)?;
    let parent_id: Option<String> = row.get(5)?;
    let created_at: chrono::DateTime<chrono::Utc> = row.get(6)?;
    let last_modified: chrono::DateTime<chrono::Utc> = row.get(7)?;

    let observations: Vec<String> = serde_json::from_str(&observations_json).unwrap_or_default();
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();

    let entity = Entity {
        name: EntityName::new(name).map_err(from_validation)?,
        entity_type: EntityType::new(entity_type).map_err(from_validation)?,
        observations: observations
            .into_iter()
            .map(Observation::new)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(from_validation)?,
        tags: tags
            .into_iter()
            .map(Tag::new)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(from_validation)?,
        importance: importance.map(Importance::new).transpose().map_err(from_validation)?,
        parent_id: parent_id.map(EntityName::new).transpose().map_err(from_validation)?,
        timestamps: TimestampPair::new(created_at, last_modified).map_err(from_validation)?,
    };
    Ok(entity)
}

fn row_to_relation(row: &rusqlite::Row) -> rusqlite::Result<Relation> {
    let from: String = row.get(0)?;
    let to: String = row.get(1)?;
    let relation_type: String = row.get(2)?;
    let created_at: chrono::DateTime<chrono::Utc> = row.get(3)?;
    let last_modified: chrono::DateTime<chrono::Utc> = row.get(4)?;
    Ok(Relation {
        from: EntityName::new(from).map_err(from_validation)?,
        to: EntityName::new(to).map_err(from_validation)?,
        relation_type: RelationType::new(relation_type).map_err(from_validation)?,
        timestamps: TimestampPair::new(created_at, last_modified).map_err(from_validation)?,
    })
}

fn from_validation(err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        err.to_string(),
    )))
}

fn insert_entity(conn: &Connection, entity: &Entity) -> rusqlite::Result<()> {
    let observations_json =
        serde_json::to_string(&entity.observations.iter().map(|o| o.as_str()).collect::<Vec<_>>())
            .unwrap_or_default();
    let tags_json =
        serde_json::to_string(&entity.tags.iter().map(|t| t.as_str()).collect::<Vec<_>>()).unwrap_or_default();

    conn.execute(
        "INSERT OR REPLACE INTO entities (name, entity_type, observations, tags, importance, parent_id, created_at, last_modified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entity.name.as_str(),
            entity.entity_type.as_str(),
            observations_json,
            tags_json,
            entity.importance.map(|i| i.get() as i64),
            entity.parent_id.as_ref().map(|p| p.as_str()),
            entity.timestamps.created_at(),
            entity.timestamps.last_modified(),
        ],
    )?;

    conn.execute("DELETE FROM entities_fts WHERE name = ?1", params![entity.name.as_str()])?;
    conn.execute(
        "INSERT INTO entities_fts (name, entity_type, observations) VALUES (?1, ?2, ?3)",
        params![
            entity.name.as_str(),
            entity.entity_type.as_str(),
            entity
                .observations
                .iter()
                .map(|o| o.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl GraphStorage for SqlStorage {
    #[instrument(skip(self))]
    async fn load_graph(&self) -> Result<Arc<KnowledgeGraph>> {
        Ok(self.cached.read().clone())
    }

    async fn get_graph_for_mutation(&self) -> Result<KnowledgeGraph> {
        Ok(self.state.read().graph.clone())
    }

    async fn append_entity(&self, entity: Entity) -> Result<()> {
        let conn = self.conn.lock().await;
        insert_entity(&conn, &entity)?;
        drop(conn);
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
        if !self.state.read().indices.names.contains(relation.from.as_str())
            || !self.state.read().indices.names.contains(relation.to.as_str())
        {
            return Err(GraphError::not_found(format!(
                "{} or {}",
                relation.from, relation.to
            )));
        }
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO relations (\"from\", \"to\", relation_type, created_at, last_modified) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                relation.from.as_str(),
                relation.to.as_str(),
                relation.relation_type.as_str(),
                relation.timestamps.created_at(),
                relation.timestamps.last_modified(),
            ],
        )?;
        drop(conn);
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

        let conn = self.conn.lock().await;
        insert_entity(&conn, &entity)?;
        drop(conn);
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
        let existing = { self.state.read().indices.names.get(name).cloned() };
        let Some(mut entity) = existing else {
            return Ok(false);
        };
        entity.observations.push(Observation::new(observation.clone())?);
        entity.touch();

        let conn = self.conn.lock().await;
        insert_entity(&conn, &entity)?;
        drop(conn);
        {
            let mut state = self.state.write();
            state.indices.observations.set(name, entity.observations.len());
            state.indices.lowercase.invalidate(name);
            if let Some(slot) = state.graph.entities.iter_mut().find(|e| e.name.as_str() == name) {
                *slot = entity;
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
        let existing = { self.state.read().indices.names.get(name).cloned() };
        let Some(mut entity) = existing else {
            return Ok(false);
        };
        let before = entity.observations.len();
        entity.observations.retain(|o| o.as_str() != observation);
        if entity.observations.len() == before {
            return Ok(false);
        }
        entity.touch();

        let conn = self.conn.lock().await;
        insert_entity(&conn, &entity)?;
        drop(conn);
        {
            let mut state = self.state.write();
            state.indices.observations.set(name, entity.observations.len());
            state.indices.lowercase.invalidate(name);
            if let Some(slot) = state.graph.entities.iter_mut().find(|e| e.name.as_str() == name) {
                *slot = entity;
            }
        }
        self.refresh_cache();
        self.events.publish(Event::ObservationDeleted {
            name: name.to_string(),
            observation: observation.to_string(),
        });
        Ok(true)
    }

    async fn delete_entity(&self, name: &str) -> Result<bool> {
        let entity = { self.state.read().indices.names.get(name).cloned() };
        let Some(entity) = entity else {
            return Ok(false);
        };
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM entities WHERE name = ?1", params![name])?;
        conn.execute("DELETE FROM entities_fts WHERE name = ?1", params![name])?;
        drop(conn);
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
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "DELETE FROM relations WHERE \"from\" = ?1 AND \"to\" = ?2 AND relation_type = ?3",
            params![from, to, relation_type],
        )?;
        drop(conn);
        if changed == 0 {
            return Ok(false);
        }
        {
            let mut state = self.state.write();
            state.indices.on_relation_deleted(from, to, relation_type);
            state.graph.relations.retain(|r| {
                !(r.from.as_str() == from && r.to.as_str() == to && r.relation_type.as_str() == relation_type)
            });
        }
        self.refresh_cache();
        self.events.publish(Event::RelationDeleted {
            from: from.to_string(),
            to: to.to_string(),
            relation_type: relation_type.to_string(),
        });
        Ok(true)
    }

    async fn save_graph(&self, graph: KnowledgeGraph) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM relations", [])?;
        tx.execute("DELETE FROM entities", [])?;
        tx.execute("DELETE FROM entities_fts", [])?;
        for entity in &graph.entities {
            insert_entity(&tx, entity)?;
        }
        for relation in &graph.relations {
            tx.execute(
                "INSERT OR REPLACE INTO relations (\"from\", \"to\", relation_type, created_at, last_modified) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    relation.from.as_str(),
                    relation.to.as_str(),
                    relation.relation_type.as_str(),
                    relation.timestamps.created_at(),
                    relation.timestamps.last_modified(),
                ],
            )?;
        }
        tx.commit()?;
        drop(conn);
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
        Ok(())
    }

    async fn compact(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("VACUUM;")?;
        Ok(())
    }

    async fn clear_cache(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        let graph = load_graph_from_conn(&conn)?;
        drop(conn);
        let indices = SecondaryIndices::build(&graph);
        {
            let mut state = self.state.write();
            state.indices = indices;
            state.graph = graph;
        }
        self.refresh_cache();
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
        let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO embeddings (name, vector, model) VALUES (?1, ?2, ?3)",
            params![name, bytes, model],
        )?;
        Ok(())
    }

    async fn get_embedding(&self, name: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.conn.lock().await;
        let bytes: Option<Vec<u8>> = conn
            .query_row("SELECT vector FROM embeddings WHERE name = ?1", params![name], |r| r.get(0))
            .optional()?;
        Ok(bytes.map(|b| bytes_to_f32(&b)))
    }

    async fn load_all_embeddings(&self) -> Result<Vec<(String, Vec<f32>)>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT name, vector FROM embeddings")?;
        let rows = stmt.query_map([], |r| {
            let name: String = r.get(0)?;
            let bytes: Vec<u8> = r.get(1)?;
            Ok((name, bytes))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (name, bytes) = row?;
            out.push((name, bytes_to_f32(&bytes)));
        }
        Ok(out)
    }

    async fn remove_embedding(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute("DELETE FROM embeddings WHERE name = ?1", params![name])?;
        Ok(changed > 0)
    }

    async fn clear_all_embeddings(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM embeddings", [])?;
        Ok(())
    }

    async fn has_embedding(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE name = ?1",
            params![name],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    async fn get_embedding_stats(&self) -> Result<EmbeddingStats> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM embeddings", [], |r| r.get(0))?;
        let dimension: Option<i64> = conn
            .query_row("SELECT LENGTH(vector) FROM embeddings LIMIT 1", [], |r| r.get(0))
            .optional()?;
        let model: Option<String> = conn
            .query_row("SELECT model FROM embeddings WHERE model IS NOT NULL LIMIT 1", [], |r| r.get(0))
            .optional()?
            .flatten();
        Ok(EmbeddingStats {
            count: count as usize,
            dimension: dimension.map(|d| (d / 4) as usize),
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

fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relation_requires_both_endpoints_to_exist() {
        let storage = SqlStorage::open_in_memory().await.unwrap();
        let err = storage
            .append_relation(Relation::new("Alice", "Bob", "knows").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_entity_cascades_relations_via_foreign_key() {
        let storage = SqlStorage::open_in_memory().await.unwrap();
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

    #[tokio::test]
    async fn embeddings_round_trip() {
        let storage = SqlStorage::open_in_memory().await.unwrap();
        storage
            .append_entity(Entity::new("Alice", "person", Vec::<String>::new(), Vec::<String>::new(), None, None).unwrap())
            .await
            .unwrap();
        storage
            .store_embedding("Alice", vec![0.1, 0.2, 0.3], Some("mock".to_string()))
            .await
            .unwrap();
        let fetched = storage.get_embedding("Alice").await.unwrap().unwrap();
        assert_eq!(fetched.len(), 3);
        assert!(storage.has_embedding("Alice").await.unwrap());
    }
}
