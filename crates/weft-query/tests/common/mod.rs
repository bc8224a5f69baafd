//! Shared fixtures for engine integration tests: a small FastAPI corpus and
//! fake backends that fail, hang, or count calls.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use weft_cache::{CacheBackend, CacheEntry, InMemoryCacheBackend};
use weft_core::{Chunk, EngineConfig, Error, Result};
use weft_graph::{
    Edge, GraphData, GraphNode, GraphStore, InMemoryGraphStore, Neighbor, NodeLabel, Relationship,
};
use weft_query::{ConceptVocabulary, HybridQueryEngine};
use weft_vector::{HashEmbeddingProvider, InMemoryVectorStore, ScoredChunk, VectorQuery, VectorStore};

// ============================================================================
// Corpus
// ============================================================================

/// Chunk id found by both signals for "FastAPI authentication".
pub const OAUTH2_CHUNK: &str = "chunk-oauth2";

fn chunk(id: &str, title: &str, content: &str, topic: &str, quality: f32) -> Chunk {
    let embedder = HashEmbeddingProvider::default();
    Chunk::new(id, title, content)
        .with_source("FastAPI Docs", format!("https://docs.example.com/{id}"))
        .with_topic(topic)
        .with_quality(quality)
        .with_embedding(embedder.embed_text(content))
}

/// Documentation chunks with hash embeddings.
pub fn chunks() -> Vec<Chunk> {
    vec![
        chunk(
            OAUTH2_CHUNK,
            "FastAPI OAuth2 Password Bearer",
            "FastAPI authentication with OAuth2 password bearer tokens",
            "Authentication",
            0.9,
        ),
        chunk(
            "chunk-deps",
            "FastAPI Dependency Injection",
            "FastAPI dependency injection with Depends",
            "Dependency Injection",
            0.9,
        ),
        chunk(
            "chunk-django",
            "Django Authentication Backends",
            "Django REST framework authentication backends",
            "Authentication",
            0.8,
        ),
        chunk(
            "chunk-pydantic",
            "Pydantic Models",
            "Pydantic models validate request bodies",
            "Validation",
            0.3,
        ),
    ]
}

/// Vector store over [`chunks`].
pub fn vector_store() -> Arc<dyn VectorStore> {
    let mut store = InMemoryVectorStore::new();
    store.extend(chunks());
    Arc::new(store)
}

/// Frameworks, topics, a source, and one chunk reference:
///
/// ```text
/// FastAPI ─COVERS_TOPIC─▶ Authentication ◀─COVERS_TOPIC─ chunk-oauth2
///    │                          │                           ▲
///    └─RELATED_TO─▶ Pydantic    └─RELATED_TO─▶ OAuth2       │
///                                              FastAPI Docs ─DOCUMENTS─┘
/// Django ─COVERS_TOPIC─▶ Authentication
/// ```
pub fn graph_data() -> GraphData {
    let mut graph = GraphData::new();
    graph.add_node(GraphNode::new("fastapi", "FastAPI", NodeLabel::Framework));
    graph.add_node(GraphNode::new("django", "Django", NodeLabel::Framework));
    graph.add_node(GraphNode::new("pydantic", "Pydantic", NodeLabel::Framework));
    graph.add_node(GraphNode::new("authentication", "Authentication", NodeLabel::Topic));
    graph.add_node(GraphNode::new("oauth2", "OAuth2", NodeLabel::Topic));
    graph.add_node(GraphNode::new("fastapi-docs", "FastAPI Docs", NodeLabel::Source));
    graph.add_node(
        GraphNode::new(OAUTH2_CHUNK, "FastAPI OAuth2 Password Bearer", NodeLabel::ChunkRef)
            .with_property("snippet", "FastAPI authentication with OAuth2 password bearer tokens")
            .with_property("source_name", "FastAPI Docs")
            .with_property("topics", vec!["Authentication"]),
    );

    let edges = [
        Edge::new("fastapi", "authentication", Relationship::CoversTopic),
        Edge::new("django", "authentication", Relationship::CoversTopic),
        Edge::new(OAUTH2_CHUNK, "authentication", Relationship::CoversTopic),
        Edge::new("fastapi-docs", OAUTH2_CHUNK, Relationship::Documents),
        Edge::new("fastapi", "pydantic", Relationship::RelatedTo).with_strength(0.9),
        Edge::new("authentication", "oauth2", Relationship::RelatedTo).with_strength(0.7),
    ];
    for edge in edges {
        graph.add_edge(edge).unwrap();
    }
    graph
}

/// Graph store over [`graph_data`].
pub fn graph_store() -> Arc<dyn GraphStore> {
    Arc::new(InMemoryGraphStore::new(graph_data()))
}

/// Vocabulary matching the corpus.
pub fn vocabulary() -> ConceptVocabulary {
    ConceptVocabulary::new([
        "FastAPI",
        "Django",
        "Pydantic",
        "Authentication",
        "OAuth2",
        "Dependency Injection",
    ])
}

/// Configuration with a short retry delay.
pub fn config() -> EngineConfig {
    EngineConfig {
        retry_base_delay_ms: 10,
        ..EngineConfig::default()
    }
}

/// Builds an engine over the given backends with the fixture vocabulary.
pub async fn engine_with(
    vector: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
    cache: Arc<dyn CacheBackend>,
    config: EngineConfig,
) -> HybridQueryEngine {
    HybridQueryEngine::builder()
        .config(config)
        .vector_store(vector)
        .graph_store(graph)
        .cache_backend(cache)
        .vocabulary(vocabulary())
        .build()
        .await
        .unwrap()
}

/// Engine over the healthy fixture backends.
pub async fn engine() -> HybridQueryEngine {
    engine_with(
        vector_store(),
        graph_store(),
        Arc::new(InMemoryCacheBackend::new()),
        config(),
    )
    .await
}

// ============================================================================
// Fake backends
// ============================================================================

/// Vector store that always fails.
#[derive(Default)]
pub struct FailingVectorStore {
    pub calls: AtomicUsize,
}

#[async_trait]
impl VectorStore for FailingVectorStore {
    async fn search(&self, _query: &VectorQuery) -> Result<Vec<ScoredChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::backend_unavailable("vector", "connection refused"))
    }

    fn name(&self) -> &str {
        "failing-vector"
    }

    fn chunk_count(&self) -> usize {
        0
    }
}

/// Graph store that always fails.
#[derive(Default)]
pub struct FailingGraphStore {
    pub calls: AtomicUsize,
}

impl FailingGraphStore {
    fn fail<T>(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::backend_unavailable("graph", "connection refused"))
    }
}

#[async_trait]
impl GraphStore for FailingGraphStore {
    async fn match_nodes(&self, _term: &str, _fuzzy_threshold: f64) -> Result<Vec<GraphNode>> {
        self.fail()
    }

    async fn expand(
        &self,
        _node_ids: &[String],
        _relationships: Option<&[Relationship]>,
    ) -> Result<Vec<Neighbor>> {
        self.fail()
    }

    async fn node_names(&self, _labels: &[NodeLabel]) -> Result<Vec<String>> {
        self.fail()
    }

    fn name(&self) -> &str {
        "failing-graph"
    }

    fn node_count(&self) -> usize {
        0
    }
}

/// Vector store that fails every search for one term and answers the rest
/// from the fixture corpus.
pub struct TermFailingVectorStore {
    inner: Arc<dyn VectorStore>,
    failing: Vec<f32>,
    pub failures: AtomicUsize,
}

impl TermFailingVectorStore {
    pub fn new(term: &str) -> Self {
        Self {
            inner: vector_store(),
            failing: HashEmbeddingProvider::default().embed_text(term),
            failures: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorStore for TermFailingVectorStore {
    async fn search(&self, query: &VectorQuery) -> Result<Vec<ScoredChunk>> {
        if query.embedding == self.failing {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(Error::backend_unavailable("vector", "shard offline"));
        }
        self.inner.search(query).await
    }

    fn name(&self) -> &str {
        "term-failing-vector"
    }

    fn chunk_count(&self) -> usize {
        self.inner.chunk_count()
    }
}

/// Vector store that never answers.
pub struct HangingVectorStore;

#[async_trait]
impl VectorStore for HangingVectorStore {
    async fn search(&self, _query: &VectorQuery) -> Result<Vec<ScoredChunk>> {
        std::future::pending().await
    }

    fn name(&self) -> &str {
        "hanging-vector"
    }

    fn chunk_count(&self) -> usize {
        0
    }
}

/// Graph store whose node matching never answers.
pub struct HangingGraphStore;

#[async_trait]
impl GraphStore for HangingGraphStore {
    async fn match_nodes(&self, _term: &str, _fuzzy_threshold: f64) -> Result<Vec<GraphNode>> {
        std::future::pending().await
    }

    async fn expand(
        &self,
        _node_ids: &[String],
        _relationships: Option<&[Relationship]>,
    ) -> Result<Vec<Neighbor>> {
        std::future::pending().await
    }

    async fn node_names(&self, _labels: &[NodeLabel]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "hanging-graph"
    }

    fn node_count(&self) -> usize {
        0
    }
}

/// Cache backend that counts writes per namespace.
#[derive(Default)]
pub struct CountingCache {
    inner: InMemoryCacheBackend,
    pub result_writes: AtomicUsize,
    pub analysis_writes: AtomicUsize,
}

impl CountingCache {
    pub fn result_writes(&self) -> usize {
        self.result_writes.load(Ordering::SeqCst)
    }

    pub fn analysis_writes(&self) -> usize {
        self.analysis_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheBackend for CountingCache {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(namespace, key).await
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        match entry.namespace.as_str() {
            weft_query::RESULTS_NAMESPACE => self.result_writes.fetch_add(1, Ordering::SeqCst),
            _ => self.analysis_writes.fetch_add(1, Ordering::SeqCst),
        };
        self.inner.set(entry).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        self.inner.delete(namespace, key).await
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Cache backend whose calls never answer.
pub struct HangingCache;

#[async_trait]
impl CacheBackend for HangingCache {
    async fn get(&self, _namespace: &str, _key: &str) -> Result<Option<Vec<u8>>> {
        std::future::pending().await
    }

    async fn set(&self, _entry: CacheEntry) -> Result<()> {
        std::future::pending().await
    }

    async fn delete(&self, _namespace: &str, _key: &str) -> Result<()> {
        std::future::pending().await
    }

    fn name(&self) -> &str {
        "hanging"
    }
}
