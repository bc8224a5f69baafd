//! Embedding providers.
//!
//! The [`EmbeddingProvider`] trait turns query text into a vector comparable
//! with stored chunk embeddings. Model selection lives outside this crate;
//! [`HashEmbeddingProvider`] is a deterministic, dependency-free embedder
//! used by tests and the CLI corpus loader.

use async_trait::async_trait;
use weft_core::{Result, tokenize};

/// Produces fixed-length embeddings for text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds several texts, preserving order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Length of every embedding this provider returns.
    fn dimension(&self) -> usize;

    /// Provider name for diagnostics.
    fn name(&self) -> &str;
}

// ============================================================================
// HashEmbeddingProvider
// ============================================================================

/// Deterministic feature-hashing embedder.
///
/// Each token and each adjacent token pair is hashed with BLAKE3 into one of
/// `dimension` buckets with a hashed sign; the vector is L2-normalized. Texts
/// sharing vocabulary land close together under cosine similarity, which is
/// enough to exercise ranking without a model.
#[derive(Clone, Debug)]
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    /// Default embedding width.
    pub const DEFAULT_DIMENSION: usize = 256;

    /// Creates an embedder producing `dimension`-wide vectors (at least 1).
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embeds synchronously; the async trait method delegates here.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0_f32; self.dimension];

        for token in &tokens {
            self.accumulate(&mut vector, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let joined = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, joined.as_bytes(), 0.5);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let digest = blake3::hash(feature);
        let bytes = digest.as_bytes();
        let mut index_bytes = [0u8; 8];
        index_bytes.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(index_bytes) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::cosine_similarity;

    #[test]
    fn test_dimension_and_norm() {
        let provider = HashEmbeddingProvider::new(64);
        let v = provider.embed_text("FastAPI OAuth2 password bearer");
        assert_eq!(v.len(), 64);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_deterministic() {
        let provider = HashEmbeddingProvider::default();
        assert_eq!(
            provider.embed_text("dependency injection"),
            provider.embed_text("Dependency   Injection!")
        );
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let provider = HashEmbeddingProvider::new(8);
        assert!(provider.embed_text("  ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_shared_vocabulary_is_closer() {
        let provider = HashEmbeddingProvider::default();
        let query = provider.embed_text("fastapi authentication");
        let near = provider.embed_text("authentication in fastapi with oauth2");
        let far = provider.embed_text("django orm migrations");
        assert!(cosine_similarity(&query, &near) > cosine_similarity(&query, &far));
    }

    #[tokio::test]
    async fn test_trait_embed_batch() {
        let provider = HashEmbeddingProvider::new(16);
        let batch = provider.embed_batch(&["a b", "c"]).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], provider.embed("a b").await.unwrap());
        assert_eq!(provider.dimension(), 16);
        assert_eq!(provider.name(), "hash");
    }

    #[test]
    fn test_zero_dimension_clamped() {
        assert_eq!(HashEmbeddingProvider::new(0).embed_text("x").len(), 1);
    }
}
