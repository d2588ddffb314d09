// Storage Contract - Stage "core": the interface both backends implement.
// Generalizes the teacher's `Storage`/`GraphStorage` traits (contracts.rs,
// graph_storage.rs) from path-addressed documents to named entities and
// directed relations.

pub mod append_log;
pub mod secondary_index;
pub mod sql;
pub mod transaction;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::events::EventBus;
use crate::model::{Entity, EntityUpdate, KnowledgeGraph, Relation, SnapshotVersion};

/// Pre-lowercased view of an entity's searchable text, produced lazily by
/// the storage layer's `LowercaseCache` and invalidated on update (spec 3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LowercaseView {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingStats {
    pub count: usize,
    pub dimension: Option<usize>,
    pub model: Option<String>,
}

/// The storage contract (spec 4.1). Both backends implement this; every
/// mutation emits a typed `Event` (spec 4.2) before returning.
#[async_trait]
pub trait GraphStorage: Send + Sync {
    /// Returns the cached, immutable snapshot. Cheap: no I/O on the happy
    /// path, no lock held across the return.
    async fn load_graph(&self) -> Result<Arc<KnowledgeGraph>>;

    /// Returns a deep copy of the current graph, safe to mutate locally
    /// and hand back via `save_graph`.
    async fn get_graph_for_mutation(&self) -> Result<KnowledgeGraph>;

    /// Appends a new entity.
    ///
    /// # Postconditions
    /// `get_entity_by_name(name)` resolves to `entity` and the type index
    /// contains `name` under `entity.entity_type` before this returns.
    async fn append_entity(&self, entity: Entity) -> Result<()>;

    /// Appends a relation. Endpoints need not both exist in append-log
    /// mode (orphan relations are legal); the SQL backend enforces the
    /// foreign key at commit time.
    async fn append_relation(&self, relation: Relation) -> Result<()>;

    /// Applies a partial update. Returns `false` (not an error) if `name`
    /// does not resolve to an entity.
    async fn update_entity(&self, name: &str, update: EntityUpdate) -> Result<bool>;

    /// Adds an observation to an existing entity; bumps `lastModified`.
    async fn add_observation(&self, name: &str, observation: String) -> Result<bool>;

    /// Removes a matching observation (by exact text) from an entity.
    async fn remove_observation(&self, name: &str, observation: &str) -> Result<bool>;

    /// Deletes an entity. The SQL backend cascades to relations that
    /// reference it; the append-log backend filters them out as orphans.
    async fn delete_entity(&self, name: &str) -> Result<bool>;

    /// Deletes one relation matching the full triple.
    async fn delete_relation(&self, from: &str, to: &str, relation_type: &str) -> Result<bool>;

    /// Replaces the whole graph atomically.
    async fn save_graph(&self, graph: KnowledgeGraph) -> Result<()>;

    /// Forces any buffered writes to durable storage.
    async fn flush(&self) -> Result<()>;

    /// Reclaims space (append-log: rewrites the log dropping tombstoned
    /// records; SQL: runs `VACUUM`-equivalent maintenance).
    async fn compact(&self) -> Result<()>;

    /// Forces the cached snapshot and indices to reload from the backing
    /// store on next access.
    async fn clear_cache(&self) -> Result<()>;

    fn get_entity_by_name(&self, name: &str) -> Option<Entity>;
    fn has_entity(&self, name: &str) -> bool;
    fn get_entities_by_type(&self, entity_type: &str) -> Vec<Entity>;
    fn get_entity_types(&self) -> Vec<String>;
    fn get_lowercased(&self, name: &str) -> Option<LowercaseView>;
    fn get_relations_from(&self, name: &str) -> Vec<Relation>;
    fn get_relations_to(&self, name: &str) -> Vec<Relation>;
    fn get_relations_for(&self, name: &str) -> (Vec<Relation>, Vec<Relation>);
    fn has_relations(&self, name: &str) -> bool;

    async fn store_embedding(
        &self,
        name: &str,
        vector: Vec<f32>,
        model: Option<String>,
    ) -> Result<()>;
    async fn get_embedding(&self, name: &str) -> Result<Option<Vec<f32>>>;
    async fn load_all_embeddings(&self) -> Result<Vec<(String, Vec<f32>)>>;
    async fn remove_embedding(&self, name: &str) -> Result<bool>;
    async fn clear_all_embeddings(&self) -> Result<()>;
    async fn has_embedding(&self, name: &str) -> Result<bool>;
    async fn get_embedding_stats(&self) -> Result<EmbeddingStats>;

    /// Version bumped on every mutation; used to invalidate caches keyed
    /// on `(query, filters, version)`.
    fn snapshot_version(&self) -> SnapshotVersion;

    fn events(&self) -> Arc<EventBus>;
}
