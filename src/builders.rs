// Builder patterns for configuring a graph store at open time
// (SPEC_FULL.md section B, "Configuration"). Fluent builders with
// sensible defaults, following the teacher's `StorageConfigBuilder`/
// `IndexConfigBuilder` shape - explicit values only, no environment
// variable reads (that is the embedding application's job).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Result};

use crate::search::hybrid::HybridWeights;
use crate::vector::store::VectorStoreConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    AppendLog,
    Sql,
}

/// Configuration for opening a graph store.
pub struct StorageConfig {
    pub backend: Backend,
    pub path: PathBuf,
    pub cache_size: Option<usize>,
    pub compact_interval: Option<Duration>,
}

pub struct StorageConfigBuilder {
    backend: Backend,
    path: Option<PathBuf>,
    cache_size: Option<usize>,
    compact_interval: Option<Duration>,
}

impl StorageConfigBuilder {
    pub fn new() -> Self {
        Self {
            backend: Backend::AppendLog,
            path: None,
            cache_size: Some(10_000),
            compact_interval: Some(Duration::from_secs(3600)),
        }
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn cache_size(mut self, entries: usize) -> Self {
        self.cache_size = Some(entries);
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.cache_size = None;
        self
    }

    pub fn compact_interval(mut self, interval: Duration) -> Self {
        self.compact_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<StorageConfig> {
        let path = self.path.ok_or_else(|| anyhow::anyhow!("storage path is required"))?;
        Ok(StorageConfig {
            backend: self.backend,
            path,
            cache_size: self.cache_size,
            compact_interval: self.compact_interval,
        })
    }
}

impl Default for StorageConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the lexical/vector index layer: BM25 tuning,
/// embedding dimensionality, and vector quantization threshold.
pub struct IndexConfig {
    pub bm25_k1: f32,
    pub bm25_b: f32,
    pub embedding_dimension: usize,
    pub vector_store: VectorStoreConfig,
}

pub struct IndexConfigBuilder {
    bm25_k1: f32,
    bm25_b: f32,
    embedding_dimension: usize,
    min_vectors_for_quantization: usize,
}

impl IndexConfigBuilder {
    pub fn new() -> Self {
        Self {
            bm25_k1: 1.2,
            bm25_b: 0.75,
            embedding_dimension: 384,
            min_vectors_for_quantization: 10_000,
        }
    }

    pub fn bm25_k1(mut self, k1: f32) -> Self {
        self.bm25_k1 = k1;
        self
    }

    pub fn bm25_b(mut self, b: f32) -> Result<Self> {
        ensure!((0.0..=1.0).contains(&b), "bm25 b parameter must be between 0.0 and 1.0");
        self.bm25_b = b;
        Ok(self)
    }

    pub fn embedding_dimension(mut self, dim: usize) -> Self {
        self.embedding_dimension = dim;
        self
    }

    pub fn min_vectors_for_quantization(mut self, count: usize) -> Self {
        self.min_vectors_for_quantization = count;
        self
    }

    pub fn build(self) -> IndexConfig {
        IndexConfig {
            bm25_k1: self.bm25_k1,
            bm25_b: self.bm25_b,
            embedding_dimension: self.embedding_dimension,
            vector_store: VectorStoreConfig {
                min_vectors_for_quantization: self.min_vectors_for_quantization,
            },
        }
    }
}

impl Default for IndexConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the hybrid search fusion weights, validating that the
/// three layer weights add to 1.0 within tolerance.
pub struct HybridWeightsBuilder {
    semantic: f32,
    lexical: f32,
    symbolic: f32,
}

impl HybridWeightsBuilder {
    pub fn new() -> Self {
        let defaults = HybridWeights::default();
        Self {
            semantic: defaults.semantic,
            lexical: defaults.lexical,
            symbolic: defaults.symbolic,
        }
    }

    pub fn semantic(mut self, weight: f32) -> Self {
        self.semantic = weight;
        self
    }

    pub fn lexical(mut self, weight: f32) -> Self {
        self.lexical = weight;
        self
    }

    pub fn symbolic(mut self, weight: f32) -> Self {
        self.symbolic = weight;
        self
    }

    pub fn build(self) -> Result<HybridWeights> {
        let total = self.semantic + self.lexical + self.symbolic;
        ensure!(
            (total - 1.0).abs() < 1e-3,
            "hybrid weights must sum to 1.0, got {total}"
        );
        Ok(HybridWeights {
            semantic: self.semantic,
            lexical: self.lexical,
            symbolic: self.symbolic,
        })
    }
}

impl Default for HybridWeightsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_config_requires_a_path() {
        assert!(StorageConfigBuilder::new().build().is_err());
        assert!(StorageConfigBuilder::new().path("/tmp/graph").build().is_ok());
    }

    #[test]
    fn index_config_rejects_b_outside_unit_range() {
        assert!(IndexConfigBuilder::new().bm25_b(1.5).is_err());
        assert!(IndexConfigBuilder::new().bm25_b(0.5).is_ok());
    }

    #[test]
    fn hybrid_weights_must_sum_to_one() {
        assert!(HybridWeightsBuilder::new().semantic(0.9).build().is_err());
        assert!(HybridWeightsBuilder::new()
            .semantic(0.5)
            .lexical(0.3)
            .symbolic(0.2)
            .build()
            .is_ok());
    }
}
