//! Hybrid query orchestration for the Weft query engine.
//!
//! This crate ties the semantic and graph signals together:
//!
//! - [`QueryAnalyzer`]: normalization, concept detection, strategy choice
//! - [`ResultFusionEngine`]: weighted, renormalized score fusion
//! - [`strategy`]: one executor per [`Strategy`](weft_core::Strategy)
//! - [`HybridQueryEngine`]: cache, dispatch, fusion, and metrics per request
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use weft_core::{Chunk, Strategy};
//! use weft_graph::{GraphData, GraphNode, InMemoryGraphStore, NodeLabel};
//! use weft_query::{HybridQueryEngine, SearchOptions};
//! use weft_vector::{HashEmbeddingProvider, InMemoryVectorStore};
//!
//! # tokio_test::block_on(async {
//! let embedder = HashEmbeddingProvider::default();
//! let mut vectors = InMemoryVectorStore::new();
//! let text = "FastAPI dependency injection";
//! vectors.insert(Chunk::new("c1", "Dependencies", text).with_embedding(embedder.embed_text(text)));
//!
//! let mut graph = GraphData::new();
//! graph.add_node(GraphNode::new("fastapi", "FastAPI", NodeLabel::Framework));
//!
//! let engine = HybridQueryEngine::builder()
//!     .vector_store(Arc::new(vectors))
//!     .graph_store(Arc::new(InMemoryGraphStore::new(graph)))
//!     .build()
//!     .await
//!     .unwrap();
//!
//! let options = SearchOptions::new().with_strategy(Strategy::HybridBalanced);
//! let response = engine.search("fastapi dependency injection", options).await.unwrap();
//! assert!(response.results.iter().any(|r| r.id == "c1"));
//! assert!(!response.metrics.cache_hit);
//! # });
//! ```

pub mod analyzer;
pub mod engine;
pub mod fusion;
pub mod metrics;
pub mod strategy;
pub mod vocabulary;

pub use analyzer::{QueryAnalysis, QueryAnalyzer};
pub use engine::{
    ANALYSIS_NAMESPACE, HybridQueryEngine, HybridQueryEngineBuilder, RESULTS_NAMESPACE,
    SearchOptions, SearchResponse, result_cache_key,
};
pub use fusion::{FusionWeights, ResultFusionEngine, union_by_max};
pub use metrics::{EngineStatsSnapshot, RequestPhase, SearchMetrics, SignalStatus};
pub use strategy::{StrategyExecutor, executor_for};
pub use vocabulary::{ConceptMatch, ConceptVocabulary};
