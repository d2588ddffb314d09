// End-to-end scenarios from the specification (S1-S7) plus a handful of
// the testable invariants that cut across modules rather than living
// inside any one of them - phrased as black-box tests against the crate's
// public surface, the way the teacher's top-level `tests/` integration
// suite exercises its storage/index stack end to end.

use std::sync::Arc;

use async_trait::async_trait;

use kgraph_engine::error::{GraphError, Result};
use kgraph_engine::index::inverted::InvertedIndex;
use kgraph_engine::managers::{EntityManager, HierarchyManager};
use kgraph_engine::model::{Entity, EntityUpdate, Relation};
use kgraph_engine::search::filter::EntityFilter;
use kgraph_engine::search::hybrid::{HybridSearchConfig, HybridSearchManager};
use kgraph_engine::storage::append_log::AppendLogStorage;
use kgraph_engine::storage::sql::SqlStorage;
use kgraph_engine::types::Importance;
use kgraph_engine::vector::embeddings::{EmbeddingProvider, EmbeddingResult};
use kgraph_engine::vector::store::{VectorStore, VectorStoreConfig};
use kgraph_engine::GraphStorage;

fn entity(name: &str, entity_type: &str, tags: &[&str], observations: &[&str]) -> Entity {
    Entity::new(name, entity_type, observations.to_vec(), tags.to_vec(), None, None).unwrap()
}

// S1 - Basic CRUD.
#[tokio::test]
async fn s1_basic_crud_updates_importance_and_touches_last_modified() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn GraphStorage> = Arc::new(AppendLogStorage::open(dir.path()).await.unwrap());
    let manager = EntityManager::new(storage);

    manager
        .create(entity("Alice", "person", &[], &["Engineer"]))
        .await
        .unwrap();
    let before = manager.get("Alice").unwrap();

    manager
        .update(
            "Alice",
            EntityUpdate { importance: Some(Some(Importance::new(8).unwrap())), ..Default::default() },
        )
        .await
        .unwrap();
    let after = manager.get("Alice").unwrap();

    assert_eq!(before.importance, None);
    assert_eq!(after.importance.unwrap().get(), 8);
    assert_ne!(after.timestamps.last_modified(), after.timestamps.created_at());
}

// S2 - Boolean query with tag filter.
#[tokio::test]
async fn s2_boolean_with_tag_filter_narrows_to_the_matching_entity() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn GraphStorage> = Arc::new(AppendLogStorage::open(dir.path()).await.unwrap());
    storage.append_entity(entity("Alice", "person", &["python", "ai"], &[])).await.unwrap();
    storage.append_entity(entity("Bob", "person", &["python", "product"], &[])).await.unwrap();
    storage.append_entity(entity("Charlie", "person", &["design"], &[])).await.unwrap();

    let mut index = InvertedIndex::new();
    for e in [storage.get_entity_by_name("Alice"), storage.get_entity_by_name("Bob"), storage.get_entity_by_name("Charlie")]
        .into_iter()
        .flatten()
    {
        index.index_document(e.name.as_str(), &e.document_text());
    }
    index.finalize();

    let parsed = kgraph_engine::index::boolean::parse("python AND ai").unwrap();
    let matches = kgraph_engine::index::boolean::evaluate(&parsed, &index, |_, _| roaring::RoaringBitmap::new());
    let names: Vec<String> = matches.iter().filter_map(|id| index.doc_name(id).map(str::to_string)).collect();

    let filter = EntityFilter {
        tags: vec!["python".to_string()],
        ..Default::default()
    };
    let filtered: Vec<String> = names
        .into_iter()
        .filter(|name| storage.get_entity_by_name(name).map(|e| filter.matches(&e)).unwrap_or(false))
        .collect();

    assert_eq!(filtered, vec!["Alice".to_string()]);
}

// S3 - TF-IDF ranking: name+observation match outranks a tag-only match.
#[tokio::test]
async fn s3_tfidf_ranks_name_and_observation_match_above_tag_only_match() {
    let mut index = InvertedIndex::new();
    index.index_document("Alice", "Alice person");
    index.index_document("Bob", "Bob person python product");
    index.index_document("Project_Python", "Project_Python tool Internal Python automation tool");

    index.finalize();
    let ranker = kgraph_engine::index::tfidf::TfIdfRanker::new(&index);
    let scored = ranker.score("Python");

    assert!(!scored.is_empty());
    assert!(scored.iter().all(|d| d.score > 0.0));
    assert!(scored.len() <= 200);

    let rank_of = |name: &str| scored.iter().position(|d| d.name == name).unwrap();
    assert!(rank_of("Project_Python") < rank_of("Bob"));
}

// S4 - Fuzzy typo tolerance.
#[test]
fn s4_fuzzy_typo_finds_the_intended_entity() {
    let candidates = vec!["Alice".to_string(), "Bob".to_string(), "Charlie".to_string()];
    let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
    let matches = kgraph_engine::index::fuzzy::search(&pool, "Alise", &candidates, 2);

    assert!(matches.iter().any(|m| m.name == "Alice"));
}

// S5 - Vector search, including post-quantization stability.
#[test]
fn s5_vector_search_survives_forced_quantization() {
    let mut store = VectorStore::new(VectorStoreConfig { min_vectors_for_quantization: 10 });
    for i in 0..10 {
        let mut vector = vec![0.0f32; 128];
        vector[i] = 1.0;
        vector[(i + 1) % 128] = 0.2;
        store.upsert(&format!("entity{i}"), vector).unwrap();
    }
    assert!(store.is_quantized());

    let mut query = vec![0.0f32; 128];
    query[0] = 1.0;
    query[1] = 0.2;

    let results = store.search(&query, 3);
    assert_eq!(results[0].name, "entity0");
    assert!(results[0].score >= 0.9);
}

// S6 - Referential integrity under the SQL backend: deleting an entity
// cascades to relations that reference it.
#[tokio::test]
async fn s6_sql_backend_save_graph_cascades_relation_deletes() {
    let storage = SqlStorage::open_in_memory().await.unwrap();
    storage.append_entity(entity("A", "node", &[], &[])).await.unwrap();
    storage.append_entity(entity("B", "node", &[], &[])).await.unwrap();
    storage.append_relation(Relation::new("A", "B", "knows").unwrap()).await.unwrap();

    let mut graph = storage.get_graph_for_mutation().await.unwrap();
    graph.entities.retain(|e| e.name.as_str() == "B");
    graph.relations.clear();
    storage.save_graph(graph).await.unwrap();
    storage.clear_cache().await.unwrap();

    let reloaded = storage.load_graph().await.unwrap();
    assert_eq!(reloaded.entities.len(), 1);
    assert_eq!(reloaded.entities[0].name.as_str(), "B");
    assert!(reloaded.relations.is_empty());
}

// S7 - Hybrid fusion degrades gracefully when the semantic layer fails.
struct FailingEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for FailingEmbeddingProvider {
    async fn embed_texts(&self, _texts: &[String]) -> Result<EmbeddingResult> {
        Err(GraphError::storage("embedding backend unreachable"))
    }

    fn dimension(&self) -> usize {
        16
    }

    fn model_name(&self) -> &str {
        "failing"
    }

    fn max_batch_size(&self) -> usize {
        1
    }
}

#[tokio::test]
async fn s7_hybrid_search_falls_back_to_lexical_and_symbolic_when_semantic_fails() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn GraphStorage> = Arc::new(AppendLogStorage::open(dir.path()).await.unwrap());
    storage.append_entity(entity("Graph_Engine", "project", &[], &["a graph storage and search engine"])).await.unwrap();
    storage.append_entity(entity("Unrelated", "project", &[], &["nothing relevant here"])).await.unwrap();

    let mut index = InvertedIndex::new();
    for e in [storage.get_entity_by_name("Graph_Engine"), storage.get_entity_by_name("Unrelated")]
        .into_iter()
        .flatten()
    {
        index.index_document(e.name.as_str(), &e.document_text());
    }
    index.finalize();

    let manager = HybridSearchManager::new(
        storage,
        Arc::new(parking_lot::RwLock::new(index)),
        Arc::new(parking_lot::RwLock::new(VectorStore::new(VectorStoreConfig::default()))),
        Arc::new(FailingEmbeddingProvider),
        HybridSearchConfig::default(),
    );

    let outcome = manager.search("graph engine", &EntityFilter::default(), 10).await.unwrap();
    assert!(outcome.results.iter().any(|r| r.name == "Graph_Engine"));
    assert_eq!(outcome.failed_layers(), vec![kgraph_engine::search::hybrid::Layer::Semantic]);
}

// Invariant 13 - cycle prevention.
#[tokio::test]
async fn invariant_cycle_prevention_rejects_a_descendant_becoming_a_parent() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn GraphStorage> = Arc::new(AppendLogStorage::open(dir.path()).await.unwrap());
    storage.append_entity(entity("A", "node", &[], &[])).await.unwrap();
    storage.append_entity(entity("B", "node", &[], &[])).await.unwrap();

    let hierarchy = HierarchyManager::new(storage);
    hierarchy.set_parent("B", Some("A")).await.unwrap();

    let result = hierarchy.set_parent("A", Some("B")).await;
    assert!(matches!(result, Err(GraphError::Cycle { .. })));
}

// Invariant 5 - SQL backend cascade on direct entity delete (not via
// `saveGraph`, exercising `delete_entity` directly).
#[tokio::test]
async fn invariant_sql_delete_entity_cascades_relations() {
    let storage = SqlStorage::open_in_memory().await.unwrap();
    storage.append_entity(entity("A", "node", &[], &[])).await.unwrap();
    storage.append_entity(entity("B", "node", &[], &[])).await.unwrap();
    storage.append_relation(Relation::new("A", "B", "knows").unwrap()).await.unwrap();

    storage.delete_entity("A").await.unwrap();

    assert!(storage.get_relations_from("A").is_empty());
    assert!(storage.get_relations_to("B").is_empty());
}
