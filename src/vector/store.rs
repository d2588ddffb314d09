// Vector store: cosine similarity search over L2-normalized embeddings,
// with optional 8-bit scalar quantization once the collection grows past
// a threshold (spec 4.5.1). Grounded on the teacher's `VectorIndex`
// (vector_index.rs) for the general shape (owned map of vectors, a
// dimension invariant, auto-flush-style threshold), generalized from HNSW
// graph storage to the simpler brute-force cosine scan the spec calls
// for, since the spec has no approximate-neighbor requirement.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum StoredVector {
    Full(Vec<f32>),
    Quantized(QuantizedVector),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuantizedVector {
    codes: Vec<u8>,
    min: f32,
    scale: f32,
}

impl QuantizedVector {
    fn encode(vector: &[f32]) -> Self {
        let min = vector.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = vector.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let range = (max - min).max(f32::EPSILON);
        let scale = range / 255.0;
        let codes = vector
            .iter()
            .map(|&v| (((v - min) / scale).round().clamp(0.0, 255.0)) as u8)
            .collect();
        Self { codes, min, scale }
    }

    fn dequantize(&self) -> Vec<f32> {
        self.codes.iter().map(|&c| self.min + c as f32 * self.scale).collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VectorStoreConfig {
    /// Once the store holds at least this many vectors, every stored
    /// vector (new and existing) switches to 8-bit quantized form.
    pub min_vectors_for_quantization: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            min_vectors_for_quantization: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub name: String,
    pub score: f32,
}

pub struct VectorStore {
    dimension: Option<usize>,
    entries: HashMap<String, StoredVector>,
    config: VectorStoreConfig,
    quantized: bool,
}

impl VectorStore {
    pub fn new(config: VectorStoreConfig) -> Self {
        Self {
            dimension: None,
            entries: HashMap::new(),
            config,
            quantized: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_quantized(&self) -> bool {
        self.quantized
    }

    /// L2-normalizes and stores `vector` under `name`. Triggers a one-time
    /// switch to quantized storage once the threshold is crossed.
    pub fn upsert(&mut self, name: &str, vector: Vec<f32>) -> Result<()> {
        if let Some(dim) = self.dimension {
            if vector.len() != dim {
                return Err(GraphError::validation(format!(
                    "vector dimension mismatch: expected {dim}, got {}",
                    vector.len()
                )));
            }
        } else {
            self.dimension = Some(vector.len());
        }

        let normalized = normalize(vector);
        let stored = if self.quantized {
            StoredVector::Quantized(QuantizedVector::encode(&normalized))
        } else {
            StoredVector::Full(normalized)
        };
        self.entries.insert(name.to_string(), stored);

        if !self.quantized && self.entries.len() >= self.config.min_vectors_for_quantization {
            self.quantize_all();
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn quantize_all(&mut self) {
        for stored in self.entries.values_mut() {
            if let StoredVector::Full(vector) = stored {
                *stored = StoredVector::Quantized(QuantizedVector::encode(vector));
            }
        }
        self.quantized = true;
    }

    /// Asymmetric cosine search: the query stays full precision; stored
    /// vectors are dequantized on the fly when the store is quantized.
    /// Vectors are pre-normalized so cosine similarity reduces to a dot
    /// product.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<SimilarityMatch> {
        let query = normalize(query.to_vec());
        let mut scored: Vec<SimilarityMatch> = self
            .entries
            .iter()
            .map(|(name, stored)| {
                let vector = match stored {
                    StoredVector::Full(v) => v.clone(),
                    StoredVector::Quantized(q) => q.dequantize(),
                };
                SimilarityMatch {
                    name: name.clone(),
                    score: dot(&query, &vector),
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        scored.truncate(top_k);
        scored
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_the_closest_vector() {
        let mut store = VectorStore::new(VectorStoreConfig::default());
        store.upsert("a", vec![1.0, 0.0, 0.0]).unwrap();
        store.upsert("b", vec![0.0, 1.0, 0.0]).unwrap();

        let results = store.search(&[0.9, 0.1, 0.0], 1);
        assert_eq!(results[0].name, "a");
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let mut store = VectorStore::new(VectorStoreConfig::default());
        store.upsert("a", vec![1.0, 0.0]).unwrap();
        assert!(store.upsert("b", vec![1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn auto_switches_to_quantized_storage_past_threshold() {
        let mut store = VectorStore::new(VectorStoreConfig {
            min_vectors_for_quantization: 2,
        });
        store.upsert("a", vec![1.0, 0.0]).unwrap();
        assert!(!store.is_quantized());
        store.upsert("b", vec![0.0, 1.0]).unwrap();
        assert!(store.is_quantized());

        let results = store.search(&[1.0, 0.0], 1);
        assert_eq!(results[0].name, "a");
    }
}
