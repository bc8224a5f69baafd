//! Semantic search adapter.
//!
//! [`VectorSearchAdapter`] is the engine-facing side of the vector signal. It
//! embeds query text, runs similarity queries against a [`VectorStore`], and
//! converts the hits into [`SearchResult`]s. Every backend call:
//!
//! 1. waits for a slot in the adapter's [`ConnectionPool`],
//! 2. is retried once on `BackendUnavailable` (exponential backoff),
//! 3. is bounded by the request's deadline and cancellation token.

use std::sync::Arc;

use weft_core::{
    ConnectionPool, EngineConfig, RequestContext, Result, RetryPolicy, SearchResult, snippet,
};

use crate::embedding::EmbeddingProvider;
use crate::store::{VectorQuery, VectorStore};

/// Default snippet length in characters.
const DEFAULT_SNIPPET_LENGTH: usize = 200;

/// Default number of concurrent store calls.
const DEFAULT_POOL_SIZE: usize = 16;

/// Vector similarity search with pooling, retry, and deadlines.
pub struct VectorSearchAdapter {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    pool: ConnectionPool,
    retry: RetryPolicy,
    min_similarity: f32,
    snippet_length: usize,
}

impl VectorSearchAdapter {
    /// Creates an adapter with default pool size, retry policy, and
    /// similarity floor.
    pub fn new(store: Arc<dyn VectorStore>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            provider,
            pool: ConnectionPool::new("vector", DEFAULT_POOL_SIZE),
            retry: RetryPolicy::default(),
            min_similarity: 0.0,
            snippet_length: DEFAULT_SNIPPET_LENGTH,
        }
    }

    /// Creates an adapter configured from `config`.
    pub fn from_config(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(store, provider)
            .with_pool(ConnectionPool::new("vector", config.vector_pool_size))
            .with_retry(RetryPolicy::once(config.retry_base_delay()))
            .with_min_similarity(config.min_similarity)
            .with_snippet_length(config.snippet_length)
    }

    /// Replaces the connection pool.
    pub fn with_pool(mut self, pool: ConnectionPool) -> Self {
        self.pool = pool;
        self
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the similarity floor; hits at or below it are dropped.
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    /// Sets the snippet length.
    pub fn with_snippet_length(mut self, snippet_length: usize) -> Self {
        self.snippet_length = snippet_length;
        self
    }

    /// The adapter's connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Name of the underlying store.
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Embeds `text` through the provider.
    pub async fn embed(&self, ctx: &RequestContext, text: &str) -> Result<Vec<f32>> {
        let provider = &self.provider;
        let pool = &self.pool;

        ctx.guard(self.retry.run("embedding", move || async move {
            let _slot = pool.acquire(ctx).await?;
            provider.embed(text).await
        }))
        .await
    }

    /// Returns up to `limit` chunks most similar to `embedding`.
    ///
    /// Chunks below `quality_threshold` are excluded before ranking. Results
    /// are ordered by similarity descending, then quality descending, then id
    /// ascending; the semantic score is the similarity clamped to `[0, 1]`.
    pub async fn semantic_search(
        &self,
        ctx: &RequestContext,
        embedding: &[f32],
        limit: usize,
        quality_threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = VectorQuery::new(embedding.to_vec(), limit)
            .with_quality_threshold(quality_threshold)
            .with_min_similarity(self.min_similarity);
        let store = &self.store;
        let pool = &self.pool;
        let query_ref = &query;

        let hits = ctx
            .guard(self.retry.run("vector search", move || async move {
                let _slot = pool.acquire(ctx).await?;
                store.search(query_ref).await
            }))
            .await?;

        log::debug!(
            "Vector search on '{}' returned {} hits",
            self.store.name(),
            hits.len()
        );

        Ok(hits
            .into_iter()
            .filter(|hit| hit.similarity > self.min_similarity)
            .take(limit)
            .map(|hit| {
                let chunk = hit.chunk;
                SearchResult::semantic(chunk.id, chunk.title, hit.similarity)
                    .with_snippet(snippet(&chunk.content, self.snippet_length))
                    .with_source_name(chunk.source_name)
                    .with_topics(chunk.topics)
            })
            .collect())
    }
}

impl std::fmt::Debug for VectorSearchAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorSearchAdapter")
            .field("store", &self.store.name())
            .field("provider", &self.provider.name())
            .field("pool", &self.pool)
            .field("retry", &self.retry)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
