//! Shared data model: chunks, search results, signals, and strategies.
//!
//! These types cross crate boundaries: the vector adapter produces
//! [`SearchResult`]s from [`Chunk`]s, the graph adapter produces them from
//! graph nodes, and the fusion engine merges the two.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Chunk
// ============================================================================

/// A unit of ingested, embedded document text.
///
/// Chunks are created by the ingestion pipeline and are read-only to the
/// query engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Opaque identifier.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Chunk text.
    pub content: String,
    /// Name of the documentation source (e.g. "FastAPI Docs").
    pub source_name: String,
    /// Canonical URL of the source page.
    pub url: String,
    /// Topics this chunk covers.
    #[serde(default)]
    pub topics: BTreeSet<String>,
    /// Ingestion quality score in `[0, 1]`.
    pub quality_score: f32,
    /// Fixed-length embedding vector.
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// When the chunk was ingested.
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// Creates a chunk with empty metadata, full quality, and no embedding.
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            source_name: String::new(),
            url: String::new(),
            topics: BTreeSet::new(),
            quality_score: 1.0,
            embedding: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Sets the source name and URL.
    pub fn with_source(mut self, source_name: impl Into<String>, url: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self.url = url.into();
        self
    }

    /// Adds a topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topics.insert(topic.into());
        self
    }

    /// Sets the quality score, clamped to `[0, 1]`.
    pub fn with_quality(mut self, quality_score: f32) -> Self {
        self.quality_score = quality_score.clamp(0.0, 1.0);
        self
    }

    /// Sets the embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }
}

// ============================================================================
// Signal
// ============================================================================

/// A retrieval signal that can contribute to a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Vector similarity over chunk embeddings.
    Semantic,
    /// Relationship traversal over the concept graph.
    Graph,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Semantic => write!(f, "semantic"),
            Signal::Graph => write!(f, "graph"),
        }
    }
}

// ============================================================================
// SearchResult
// ============================================================================

/// One ranked hit returned to the caller.
///
/// Built per query and never persisted outside a cache payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Identifier shared by both signals (a chunk id, or a graph node id).
    pub id: String,
    /// Display title.
    pub title: String,
    /// Short excerpt of the content.
    pub snippet: String,
    /// Name of the documentation source.
    pub source_name: String,
    /// Topics attached to the hit.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Cosine similarity contribution, if found semantically.
    pub semantic_score: Option<f32>,
    /// Traversal proximity contribution, if found via the graph.
    pub graph_score: Option<f32>,
    /// Fused score in `[0, 1]`.
    pub combined_score: f32,
    /// Which signals produced this hit.
    pub found_via: BTreeSet<Signal>,
}

impl SearchResult {
    /// Creates a result carrying only a semantic score.
    pub fn semantic(id: impl Into<String>, title: impl Into<String>, score: f32) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            id: id.into(),
            title: title.into(),
            snippet: String::new(),
            source_name: String::new(),
            topics: Vec::new(),
            semantic_score: Some(score),
            graph_score: None,
            combined_score: score,
            found_via: BTreeSet::from([Signal::Semantic]),
        }
    }

    /// Creates a result carrying only a graph score.
    pub fn graph(id: impl Into<String>, title: impl Into<String>, score: f32) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            id: id.into(),
            title: title.into(),
            snippet: String::new(),
            source_name: String::new(),
            topics: Vec::new(),
            semantic_score: None,
            graph_score: Some(score),
            combined_score: score,
            found_via: BTreeSet::from([Signal::Graph]),
        }
    }

    /// Sets the snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    /// Sets the source name.
    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self
    }

    /// Sets the topics.
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the score this result carries for `signal`, if any.
    pub fn score_for(&self, signal: Signal) -> Option<f32> {
        match signal {
            Signal::Semantic => self.semantic_score,
            Signal::Graph => self.graph_score,
        }
    }

    /// Returns true if both signals found this result.
    pub fn is_multi_signal(&self) -> bool {
        self.found_via.len() > 1
    }
}

// ============================================================================
// Strategy
// ============================================================================

/// A named execution plan selecting which backends run and in what order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Vector adapter only.
    SemanticOnly,
    /// Graph adapter only.
    GraphOnly,
    /// Both adapters concurrently, fused with the configured weights.
    #[default]
    HybridBalanced,
    /// Vector first; graph seeded with the top semantic results' topics.
    SemanticThenGraph,
    /// Graph first; semantic search seeded with the top graph results' titles.
    GraphThenSemantic,
    /// Detected concepts expanded through `RELATED_TO` edges, each searched
    /// independently.
    ConceptExpansion,
}

impl Strategy {
    /// Every strategy, in declaration order.
    pub const ALL: [Strategy; 6] = [
        Strategy::SemanticOnly,
        Strategy::GraphOnly,
        Strategy::HybridBalanced,
        Strategy::SemanticThenGraph,
        Strategy::GraphThenSemantic,
        Strategy::ConceptExpansion,
    ];

    /// Stable wire name (used in cache keys and configuration).
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::SemanticOnly => "SEMANTIC_ONLY",
            Strategy::GraphOnly => "GRAPH_ONLY",
            Strategy::HybridBalanced => "HYBRID_BALANCED",
            Strategy::SemanticThenGraph => "SEMANTIC_THEN_GRAPH",
            Strategy::GraphThenSemantic => "GRAPH_THEN_SEMANTIC",
            Strategy::ConceptExpansion => "CONCEPT_EXPANSION",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    /// Parses either the wire name (`GRAPH_ONLY`) or a kebab/snake variant
    /// (`graph-only`, `graph_only`).
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_uppercase().replace('-', "_");
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == wanted)
            .ok_or_else(|| Error::config(format!("Unknown strategy: {s}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
