//! Vector store trait and in-memory implementation.
//!
//! A [`VectorStore`] answers nearest-neighbour queries over chunk embeddings.
//! The adapter in [`crate::adapter`] wraps a store with pooling, retry, and
//! deadline handling; stores themselves only rank.
//!
//! # Backends
//!
//! - [`InMemoryVectorStore`]: brute-force cosine similarity for small corpora

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use weft_core::{Chunk, Result};

/// Parameters for one similarity query.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorQuery {
    /// Query embedding.
    pub embedding: Vec<f32>,
    /// Maximum number of chunks to return.
    pub limit: usize,
    /// Chunks with `quality_score` below this are excluded before ranking.
    pub quality_threshold: f32,
    /// Chunks with similarity at or below this are dropped.
    pub min_similarity: f32,
}

impl VectorQuery {
    /// Creates a query with no quality or similarity floor.
    pub fn new(embedding: Vec<f32>, limit: usize) -> Self {
        Self {
            embedding,
            limit,
            quality_threshold: 0.0,
            min_similarity: 0.0,
        }
    }

    /// Sets the quality threshold.
    pub fn with_quality_threshold(mut self, threshold: f32) -> Self {
        self.quality_threshold = threshold;
        self
    }

    /// Sets the similarity floor.
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }
}

/// A chunk paired with its cosine similarity to the query.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredChunk {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Cosine similarity in `[-1, 1]`.
    pub similarity: f32,
}

/// Abstract vector search backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Returns the best matches for `query`, ordered by similarity
    /// descending, then quality descending, then id ascending.
    async fn search(&self, query: &VectorQuery) -> Result<Vec<ScoredChunk>>;

    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Number of stored chunks.
    fn chunk_count(&self) -> usize;
}

/// Compute cosine similarity between two vectors.
///
/// Mismatched lengths, empty vectors, and zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Ranking order shared by every store: similarity desc, quality desc, id asc.
pub fn rank_order(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.chunk
                .quality_score
                .partial_cmp(&a.chunk.quality_score)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

// ============================================================================
// InMemoryVectorStore
// ============================================================================

/// Brute-force vector store.
///
/// Holds chunks in memory keyed by id and scores every chunk per query.
///
/// # Limitations
///
/// - O(n) search time
/// - All chunks must fit in memory
#[derive(Default)]
pub struct InMemoryVectorStore {
    chunks: BTreeMap<String, Chunk>,
}

impl InMemoryVectorStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a chunk, replacing any chunk with the same id.
    pub fn insert(&mut self, chunk: Chunk) {
        if self.chunks.insert(chunk.id.clone(), chunk).is_some() {
            log::debug!("Replaced existing chunk in vector store");
        }
    }

    /// Inserts several chunks.
    pub fn extend(&mut self, chunks: impl IntoIterator<Item = Chunk>) {
        for chunk in chunks {
            self.insert(chunk);
        }
    }

    /// Looks up a chunk by id.
    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.chunks.get(id)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(&self, query: &VectorQuery) -> Result<Vec<ScoredChunk>> {
        if query.limit == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .values()
            .filter(|chunk| chunk.quality_score >= query.quality_threshold)
            .filter_map(|chunk| {
                let similarity = cosine_similarity(&query.embedding, &chunk.embedding);
                (similarity > query.min_similarity).then(|| ScoredChunk {
                    chunk: chunk.clone(),
                    similarity,
                })
            })
            .collect();

        scored.sort_by(rank_order);
        scored.truncate(query.limit);
        Ok(scored)
    }

    fn name(&self) -> &str {
        "in-memory"
    }

    fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
