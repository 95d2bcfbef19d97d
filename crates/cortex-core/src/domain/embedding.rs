//! Embedding functions
//!
//! An [`Embedder`] maps text to a fixed-length vector. The semantic cache
//! only ever compares vectors produced by the same embedder, so any
//! implementation works as long as it is deterministic enough that the same
//! question lands near itself.
//!
//! Implementations:
//! - [`HashingEmbedder`]: offline feature hashing, no model download
//! - `FastEmbedder` (feature `fastembed`): local all-MiniLM-L6-v2
//! - [`crate::llm::OllamaClient`]: Ollama `/api/embed`
//! - [`crate::llm::LlmClient`]: OpenAI-compatible `/embeddings`

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Text to vector mapping
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Cosine similarity of two vectors
///
/// Returns 0.0 when the lengths differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Deterministic feature-hashing embedder
///
/// Each lowercase alphanumeric token is hashed with SHA-256; the first eight
/// bytes pick a bucket and one more byte picks the sign. The result is
/// L2-normalized, so identical text always produces an identical unit vector
/// and texts sharing most of their words score close to 1.0.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Synchronous core, shared by the trait impl and tests
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        let tokens = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty());

        for token in tokens {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(feature = "fastembed")]
pub use self::local::FastEmbedder;

#[cfg(feature = "fastembed")]
mod local {
    use std::sync::Arc;

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use once_cell::sync::OnceCell;
    use tracing::{debug, info};

    use super::Embedder;
    use crate::error::{Error, Result};

    /// In-process all-MiniLM-L6-v2 (384 dimensions)
    ///
    /// The ONNX model is downloaded and loaded on first use, then shared.
    pub struct FastEmbedder {
        model: OnceCell<Arc<TextEmbedding>>,
    }

    impl FastEmbedder {
        pub fn new() -> Self {
            Self {
                model: OnceCell::new(),
            }
        }

        fn get_or_init_model(&self) -> Result<Arc<TextEmbedding>> {
            self.model
                .get_or_try_init(|| {
                    info!("Initializing all-MiniLM-L6-v2 embedding model");
                    let model =
                        TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
                            .map_err(|e| Error::EmbeddingFailed(e.to_string()))?;
                    Ok(Arc::new(model))
                })
                .cloned()
        }
    }

    impl Default for FastEmbedder {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let model = self.get_or_init_model()?;
            let text = text.to_string();

            // fastembed is synchronous and CPU bound
            let embeddings = tokio::task::spawn_blocking(move || {
                model
                    .embed(vec![text], None)
                    .map_err(|e| Error::EmbeddingFailed(e.to_string()))
            })
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("Embedding task failed: {}", e)))??;

            let vector = embeddings
                .into_iter()
                .next()
                .ok_or_else(|| Error::EmbeddingFailed("Empty embedding result".to_string()))?;
            debug!(dimension = vector.len(), "Generated embedding");
            Ok(vector)
        }

        fn dimension(&self) -> usize {
            384
        }

        fn name(&self) -> &str {
            "fastembed"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[tokio::test]
    async fn test_hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::new(384);
        let a = embedder.embed("Who founded SpaceX?").await.unwrap();
        let b = embedder.embed("Who founded SpaceX?").await.unwrap();

        assert_eq!(a.len(), 384);
        assert_eq!(a, b);
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hashing_embedder_is_normalized() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed_sync("the quick brown fox");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedder_ignores_case_and_punctuation() {
        let embedder = HashingEmbedder::default();
        assert_eq!(
            embedder.embed_sync("Who founded SpaceX?"),
            embedder.embed_sync("who founded spacex")
        );
    }

    #[test]
    fn test_hashing_embedder_separates_unrelated_text() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_sync("Who founded SpaceX?");
        let b = embedder.embed_sync("recipe for banana bread");
        assert!(cosine_similarity(&a, &b) < 0.5);
    }

    #[test]
    fn test_hashing_embedder_empty_text() {
        let embedder = HashingEmbedder::new(8);
        let v = embedder.embed_sync("");
        assert_eq!(v, vec![0.0; 8]);
    }
}
