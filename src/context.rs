// Manager context: wires one storage backend up to every manager and
// search surface (spec section 6), replacing the teacher's `Database`
// aggregate root (`database.rs`) with a context struct generic over the
// embedding provider. Every accessor is a cheap clone of an `Arc` handed
// out at construction time - no lazy init here, unlike the teacher's
// `WorkerPoolManager::get_or_create`, because every component needs the
// same storage handle up front to build its in-memory index from the
// current snapshot.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::builders::{IndexConfig, StorageConfig};
use crate::error::Result;
use crate::index::inverted::InvertedIndex;
use crate::managers::{
    AnalyticsManager, EntityManager, HierarchyManager, ObservationManager, RelationManager, ValidationManager,
};
use crate::search::hybrid::{HybridSearchConfig, HybridSearchManager};
use crate::storage::append_log::AppendLogStorage;
use crate::storage::sql::SqlStorage;
use crate::storage::transaction::TransactionManager;
use crate::storage::GraphStorage;
use crate::vector::cache::EmbeddingCache;
use crate::vector::embeddings::EmbeddingProvider;
use crate::vector::indexer::{IndexerConfig, VectorIndexer};
use crate::vector::store::VectorStore;

/// Everything needed to serve reads/writes against one graph: the storage
/// backend, the per-concern managers, and the search/index surfaces built
/// over it. `P` is the embedding provider used for vector indexing and
/// hybrid search's semantic layer.
pub struct GraphContext<P: EmbeddingProvider> {
    storage: Arc<dyn GraphStorage>,
    entities: EntityManager,
    relations: RelationManager,
    observations: ObservationManager,
    hierarchy: HierarchyManager,
    analytics: AnalyticsManager,
    validation: ValidationManager,
    transactions: TransactionManager,
    inverted_index: Arc<RwLock<InvertedIndex>>,
    vector_indexer: Arc<VectorIndexer<P>>,
    hybrid: Arc<HybridSearchManager<P>>,
}

impl<P: EmbeddingProvider> GraphContext<P> {
    /// Builds a context over an already-open storage backend, indexing
    /// every entity currently in the snapshot into the inverted index.
    pub async fn new(storage: Arc<dyn GraphStorage>, index_config: IndexConfig, provider: Arc<P>) -> Result<Self> {
        let graph = storage.load_graph().await?;

        let mut index = InvertedIndex::new();
        for entity in &graph.entities {
            let observations: Vec<String> = entity.observations.iter().map(|o| o.as_str().to_string()).collect();
            index.index_document_with_fields(entity.name.as_str(), entity.entity_type.as_str(), &observations);
        }
        index.finalize();
        let inverted_index = Arc::new(RwLock::new(index));

        let mut vector_store = VectorStore::new(index_config.vector_store.clone());
        for (name, vector) in storage.load_all_embeddings().await? {
            let _ = vector_store.upsert(&name, vector);
        }
        let cache = EmbeddingCache::new(1_000, std::time::Duration::from_secs(600));
        let vector_indexer = Arc::new(VectorIndexer::new(
            provider.clone(),
            vector_store,
            cache,
            IndexerConfig::default(),
        ));

        let vector_handle = Arc::new(RwLock::new(VectorStore::new(index_config.vector_store)));
        let hybrid = Arc::new(HybridSearchManager::new(
            storage.clone(),
            inverted_index.clone(),
            vector_handle,
            provider,
            HybridSearchConfig::default(),
        ));

        Ok(Self {
            storage: storage.clone(),
            entities: EntityManager::new(storage.clone()),
            relations: RelationManager::new(storage.clone()),
            observations: ObservationManager::new(storage.clone()),
            hierarchy: HierarchyManager::new(storage.clone()),
            analytics: AnalyticsManager::new(storage.clone()),
            validation: ValidationManager::new(storage.clone()),
            transactions: TransactionManager::new(storage.clone()),
            inverted_index,
            vector_indexer,
            hybrid,
        })
    }

    pub fn storage(&self) -> Arc<dyn GraphStorage> {
        self.storage.clone()
    }

    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    pub fn relations(&self) -> &RelationManager {
        &self.relations
    }

    pub fn observations(&self) -> &ObservationManager {
        &self.observations
    }

    pub fn hierarchy(&self) -> &HierarchyManager {
        &self.hierarchy
    }

    pub fn analytics(&self) -> &AnalyticsManager {
        &self.analytics
    }

    pub fn validation(&self) -> &ValidationManager {
        &self.validation
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    pub fn inverted_index(&self) -> Arc<RwLock<InvertedIndex>> {
        self.inverted_index.clone()
    }

    pub fn vector_indexer(&self) -> Arc<VectorIndexer<P>> {
        self.vector_indexer.clone()
    }

    pub fn hybrid(&self) -> Arc<HybridSearchManager<P>> {
        self.hybrid.clone()
    }
}

/// Opens an append-log-backed context rooted at `config.path`.
pub async fn open_append_log<P: EmbeddingProvider>(
    config: StorageConfig,
    index_config: IndexConfig,
    provider: Arc<P>,
) -> Result<GraphContext<P>> {
    let storage: Arc<dyn GraphStorage> = Arc::new(AppendLogStorage::open(&config.path).await?);
    GraphContext::new(storage, index_config, provider).await
}

/// Opens a SQLite-backed context at `config.path`.
pub async fn open_sql<P: EmbeddingProvider>(
    config: StorageConfig,
    index_config: IndexConfig,
    provider: Arc<P>,
) -> Result<GraphContext<P>> {
    let storage: Arc<dyn GraphStorage> = Arc::new(SqlStorage::open(&config.path).await?);
    GraphContext::new(storage, index_config, provider).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::IndexConfigBuilder;
    use crate::model::Entity;
    use crate::vector::embeddings::MockEmbeddingProvider;

    #[tokio::test]
    async fn context_indexes_preexisting_entities_on_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = AppendLogStorage::open(dir.path()).await.unwrap();
            storage
                .append_entity(Entity::new("Alice", "person", ["likes tea"], Vec::<String>::new(), None, None).unwrap())
                .await
                .unwrap();
        }

        let storage: Arc<dyn GraphStorage> = Arc::new(AppendLogStorage::open(dir.path()).await.unwrap());
        let provider = Arc::new(MockEmbeddingProvider::new(16));
        let ctx = GraphContext::new(storage, IndexConfigBuilder::new().build(), provider)
            .await
            .unwrap();

        let index = ctx.inverted_index();
        let index = index.read();
        assert!(index.document_frequency("alice") > 0);
    }
}
