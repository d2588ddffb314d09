// Pluggable embedding providers (spec 4.5.2). Adapted from the teacher's
// `embeddings.rs`: a provider trait, a local ONNX implementation, and an
// OpenAI HTTP implementation, both gated behind Cargo features so the
// engine builds with zero network/model dependencies by default. A
// deterministic `MockEmbeddingProvider` (not present in the teacher) is
// added for tests and for environments with neither feature enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::hash::stable_unit_float;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub dimension: usize,
    pub max_batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "mock-embedding".to_string(),
            dimension: 32,
            max_batch_size: 32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub embeddings: Vec<Vec<f32>>,
    pub model_used: String,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| GraphError::storage("embedding provider returned no vectors"))
    }

    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
    fn max_batch_size(&self) -> usize;
}

/// Deterministic provider with no model/network dependency: each text maps
/// to a fixed-dimension unit vector derived from `hash::stable_unit_float`,
/// so identical text always yields identical embeddings and distinct text
/// yields (with high probability) distinct directions.
pub struct MockEmbeddingProvider {
    config: EmbeddingConfig,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            config: EmbeddingConfig {
                model_name: "mock-embedding".to_string(),
                dimension,
                max_batch_size: 64,
            },
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector: Vec<f32> = (0..self.config.dimension)
            .map(|i| stable_unit_float(text, i as u64) * 2.0 - 1.0)
            .collect();
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        Ok(EmbeddingResult {
            embeddings: texts.iter().map(|t| self.embed_one(t)).collect(),
            model_used: self.config.model_name.clone(),
        })
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }

    fn max_batch_size(&self) -> usize {
        self.config.max_batch_size
    }
}

#[cfg(feature = "embeddings-onnx")]
pub mod local {
    use super::*;
    use std::path::PathBuf;

    /// Local ONNX-backed provider. Model loading is deferred to an `ort`
    /// session the way the teacher's `LocalEmbeddingProvider` defers to its
    /// own runtime handle; wiring the actual session is environment
    /// specific (model path, execution providers) and left to the
    /// application embedding this crate.
    pub struct LocalEmbeddingProvider {
        config: EmbeddingConfig,
        #[allow(dead_code)]
        model_path: PathBuf,
    }

    impl LocalEmbeddingProvider {
        pub fn new(config: EmbeddingConfig, model_path: PathBuf) -> Self {
            Self { config, model_path }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for LocalEmbeddingProvider {
        async fn embed_texts(&self, _texts: &[String]) -> Result<EmbeddingResult> {
            Err(GraphError::storage(
                "local ONNX embedding session not configured; supply a session before use",
            ))
        }

        fn dimension(&self) -> usize {
            self.config.dimension
        }

        fn model_name(&self) -> &str {
            &self.config.model_name
        }

        fn max_batch_size(&self) -> usize {
            self.config.max_batch_size
        }
    }
}

#[cfg(feature = "openai-embeddings")]
pub mod openai {
    use super::*;

    #[derive(Serialize)]
    struct EmbeddingRequest<'a> {
        model: &'a str,
        input: &'a [String],
    }

    #[derive(Deserialize)]
    struct EmbeddingResponse {
        data: Vec<EmbeddingData>,
    }

    #[derive(Deserialize)]
    struct EmbeddingData {
        embedding: Vec<f32>,
    }

    pub struct OpenAiEmbeddingProvider {
        client: reqwest::Client,
        api_key: String,
        config: EmbeddingConfig,
    }

    impl OpenAiEmbeddingProvider {
        pub fn new(api_key: String, config: EmbeddingConfig) -> Self {
            Self {
                client: reqwest::Client::new(),
                api_key,
                config,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for OpenAiEmbeddingProvider {
        async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
            let request = EmbeddingRequest {
                model: &self.config.model_name,
                input: texts,
            };
            let response = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| GraphError::storage(format!("openai request failed: {e}")))?
                .json::<EmbeddingResponse>()
                .await
                .map_err(|e| GraphError::storage(format!("openai response parse failed: {e}")))?;

            Ok(EmbeddingResult {
                embeddings: response.data.into_iter().map(|d| d.embedding).collect(),
                model_used: self.config.model_name.clone(),
            })
        }

        fn dimension(&self) -> usize {
            self.config.dimension
        }

        fn model_name(&self) -> &str {
            &self.config.model_name
        }

        fn max_batch_size(&self) -> usize {
            self.config.max_batch_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_is_deterministic_and_normalized() {
        let provider = MockEmbeddingProvider::new(16);
        let a = provider.embed_text("hello world").await.unwrap();
        let b = provider.embed_text("hello world").await.unwrap();
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn distinct_text_yields_distinct_vectors() {
        let provider = MockEmbeddingProvider::new(16);
        let a = provider.embed_text("alpha").await.unwrap();
        let b = provider.embed_text("beta").await.unwrap();
        assert_ne!(a, b);
    }
}
