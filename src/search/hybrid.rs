// Hybrid search manager (spec 4.6): runs semantic, lexical, and symbolic
// layers, normalizes each layer's scores min-max, and fuses them with
// configurable weights (default 0.5/0.3/0.2). The expensive semantic layer
// is skipped when the cheap layers already look adequate (early
// termination), and a layer that errors is logged and excluded rather than
// failing the whole search (per-layer failure isolation). Grounded on the
// teacher's `SemanticSearchEngine::hybrid_search` (semantic_search.rs) -
// that version is a stub that only runs the semantic layer; this fills in
// the lexical/symbolic fusion the teacher's own TODO left open.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::warn;

use crate::error::Result;
use crate::index::bm25::Bm25Ranker;
use crate::index::boolean;
use crate::index::inverted::InvertedIndex;
use crate::search::filter::EntityFilter;
use crate::storage::GraphStorage;
use crate::vector::embeddings::EmbeddingProvider;
use crate::vector::store::VectorStore;

#[derive(Debug, Clone, Copy)]
pub struct HybridWeights {
    pub semantic: f32,
    pub lexical: f32,
    pub symbolic: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            semantic: 0.5,
            lexical: 0.3,
            symbolic: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HybridSearchConfig {
    pub weights: HybridWeights,
    /// A lexical top score (after min-max normalization) at or above this,
    /// with at least `adequacy_min_results` hits, skips the semantic layer.
    pub adequacy_threshold: f32,
    pub adequacy_min_results: usize,
    pub candidate_limit: usize,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            weights: HybridWeights::default(),
            adequacy_threshold: 0.92,
            adequacy_min_results: 5,
            candidate_limit: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntity {
    pub name: String,
    pub score: f32,
}

/// One of the three retrieval layers a hybrid search fuses (spec 4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Semantic,
    Lexical,
    Symbolic,
}

/// Per-layer execution report: whether the layer ran, whether it
/// succeeded, how many candidates it produced, and how long it took.
/// A layer that's skipped by early termination (the semantic layer when
/// the lexical layer already looks adequate) reports `ran: false` rather
/// than `succeeded: false` - it wasn't attempted, it didn't fail.
#[derive(Debug, Clone)]
pub struct LayerReport {
    pub layer: Layer,
    pub ran: bool,
    pub succeeded: bool,
    pub result_count: usize,
    pub duration: Duration,
}

impl LayerReport {
    fn skipped(layer: Layer) -> Self {
        Self { layer, ran: false, succeeded: true, result_count: 0, duration: Duration::ZERO }
    }

    fn ran(layer: Layer, succeeded: bool, result_count: usize, duration: Duration) -> Self {
        Self { layer, ran: true, succeeded, result_count, duration }
    }
}

/// Fused results plus an execution report across the three layers, per
/// spec 4.10's requirement to surface per-layer timings, success/failure,
/// and result counts so callers can tell a degraded search from a clean one.
#[derive(Debug, Clone)]
pub struct HybridSearchResult {
    pub results: Vec<ScoredEntity>,
    pub layers: Vec<LayerReport>,
}

impl HybridSearchResult {
    /// Layers that ran but failed (errored, excluded from fusion) - not
    /// layers skipped by early termination.
    pub fn failed_layers(&self) -> Vec<Layer> {
        self.layers.iter().filter(|l| l.ran && !l.succeeded).map(|l| l.layer).collect()
    }
}

pub struct HybridSearchManager<P: EmbeddingProvider> {
    storage: Arc<dyn GraphStorage>,
    index: Arc<RwLock<InvertedIndex>>,
    vector: Arc<RwLock<VectorStore>>,
    provider: Arc<P>,
    config: HybridSearchConfig,
}

impl<P: EmbeddingProvider> HybridSearchManager<P> {
    pub fn new(
        storage: Arc<dyn GraphStorage>,
        index: Arc<RwLock<InvertedIndex>>,
        vector: Arc<RwLock<VectorStore>>,
        provider: Arc<P>,
        config: HybridSearchConfig,
    ) -> Self {
        Self {
            storage,
            index,
            vector,
            provider,
            config,
        }
    }

    pub async fn search(&self, query: &str, filter: &EntityFilter, top_k: usize) -> Result<HybridSearchResult> {
        let (lexical, lexical_report) = self.run_lexical(query);
        let (symbolic, symbolic_report) = self.run_symbolic(query);

        let lexical_norm = normalize(&lexical);
        let adequate = is_adequate(&lexical_norm, &self.config);

        let (semantic, semantic_report) = if adequate {
            (HashMap::new(), LayerReport::skipped(Layer::Semantic))
        } else {
            self.run_semantic(query).await
        };
        let semantic_norm = normalize(&semantic);
        let symbolic_norm = normalize(&symbolic);

        let mut fused: HashMap<String, f32> = HashMap::new();
        for (name, score) in &semantic_norm {
            *fused.entry(name.clone()).or_insert(0.0) += score * self.config.weights.semantic;
        }
        for (name, score) in &lexical_norm {
            *fused.entry(name.clone()).or_insert(0.0) += score * self.config.weights.lexical;
        }
        for (name, score) in &symbolic_norm {
            *fused.entry(name.clone()).or_insert(0.0) += score * self.config.weights.symbolic;
        }

        let mut results: Vec<ScoredEntity> = fused
            .into_iter()
            .filter(|(name, _)| {
                self.storage
                    .get_entity_by_name(name)
                    .map(|e| filter.matches(&e))
                    .unwrap_or(false)
            })
            .map(|(name, score)| ScoredEntity { name, score })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        results.truncate(top_k);

        Ok(HybridSearchResult {
            results,
            layers: vec![semantic_report, lexical_report, symbolic_report],
        })
    }

    fn run_lexical(&self, query: &str) -> (HashMap<String, f32>, LayerReport) {
        let start = Instant::now();
        let index = self.index.read();
        let ranker = Bm25Ranker::new(&index);
        let scores: HashMap<String, f32> = ranker
            .score(query)
            .into_iter()
            .take(self.config.candidate_limit)
            .map(|d| (d.name, d.score as f32))
            .collect();
        let report = LayerReport::ran(Layer::Lexical, true, scores.len(), start.elapsed());
        (scores, report)
    }

    fn run_symbolic(&self, query: &str) -> (HashMap<String, f32>, LayerReport) {
        let start = Instant::now();
        let parsed = match boolean::parse(query) {
            Ok(q) => q,
            Err(err) => {
                warn!("symbolic layer failed: query did not parse as boolean expression: {err}");
                return (HashMap::new(), LayerReport::ran(Layer::Symbolic, false, 0, start.elapsed()));
            }
        };
        let index = self.index.read();
        let storage = self.storage.clone();
        let matches = boolean::evaluate(&parsed, &index, |field, value| {
            let mut bitmap = roaring::RoaringBitmap::new();
            for name in index.doc_names() {
                let Some(entity) = storage.get_entity_by_name(name) else {
                    continue;
                };
                let matched = match field {
                    "type" => entity.entity_type.as_str().eq_ignore_ascii_case(value),
                    "tag" => entity.has_tag(value),
                    "name" => entity.name.as_str().eq_ignore_ascii_case(value),
                    _ => false,
                };
                if matched {
                    if let Some(id) = index.doc_id(name) {
                        bitmap.insert(id);
                    }
                }
            }
            bitmap
        });

        let scores: HashMap<String, f32> = matches
            .iter()
            .filter_map(|id| index.doc_name(id))
            .map(|name| (name.to_string(), 1.0))
            .collect();
        let report = LayerReport::ran(Layer::Symbolic, true, scores.len(), start.elapsed());
        (scores, report)
    }

    async fn run_semantic(&self, query: &str) -> (HashMap<String, f32>, LayerReport) {
        let start = Instant::now();
        match self.provider.embed_text(query).await {
            Ok(vector) => {
                let store = self.vector.read();
                let scores: HashMap<String, f32> = store
                    .search(&vector, self.config.candidate_limit)
                    .into_iter()
                    .map(|m| (m.name, m.score))
                    .collect();
                let report = LayerReport::ran(Layer::Semantic, true, scores.len(), start.elapsed());
                (scores, report)
            }
            Err(err) => {
                warn!("semantic layer failed: embedding failed: {err}");
                (HashMap::new(), LayerReport::ran(Layer::Semantic, false, 0, start.elapsed()))
            }
        }
    }
}

fn normalize(scores: &HashMap<String, f32>) -> HashMap<String, f32> {
    if scores.is_empty() {
        return HashMap::new();
    }
    let min = scores.values().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.values().cloned().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    scores
        .iter()
        .map(|(k, v)| {
            let normalized = if range.abs() < f32::EPSILON { 1.0 } else { (v - min) / range };
            (k.clone(), normalized)
        })
        .collect()
}

fn is_adequate(lexical_norm: &HashMap<String, f32>, config: &HybridSearchConfig) -> bool {
    if lexical_norm.len() < config.adequacy_min_results {
        return false;
    }
    lexical_norm
        .values()
        .cloned()
        .fold(f32::NEG_INFINITY, f32::max)
        >= config.adequacy_threshold
}
