//! JSON corpus loading.
//!
//! A corpus file carries both halves of the knowledge base:
//!
//! ```json
//! {
//!   "chunks": [{ "id": "c1", "title": "...", "content": "...", "topics": ["..."] }],
//!   "nodes":  [{ "id": "fastapi", "name": "FastAPI", "label": "Framework" }],
//!   "edges":  [{ "from": "fastapi", "to": "auth", "relationship": "COVERS_TOPIC" }]
//! }
//! ```
//!
//! Chunks without an embedding are embedded with [`HashEmbeddingProvider`].
//! `ChunkRef` nodes whose id matches a chunk inherit its snippet, source, and
//! topics when they do not set them.

use std::path::Path;

use serde::Deserialize;
use weft_core::{Chunk, Error, Result, snippet};
use weft_graph::{Edge, GraphData, GraphNode, NodeLabel};
use weft_vector::{HashEmbeddingProvider, InMemoryVectorStore, VectorStore};

/// Snippet length stored on `ChunkRef` nodes filled from chunk content.
const CHUNK_REF_SNIPPET_LENGTH: usize = 200;

fn default_quality() -> f32 {
    1.0
}

/// A chunk as written in a corpus file.
#[derive(Debug, Deserialize)]
pub struct ChunkRecord {
    /// Chunk id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Source name.
    #[serde(default)]
    pub source_name: String,
    /// Source URL.
    #[serde(default)]
    pub url: String,
    /// Topics.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Quality score in `[0, 1]`.
    #[serde(default = "default_quality")]
    pub quality_score: f32,
    /// Precomputed embedding; computed on load when absent.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    fn into_chunk(self, embedder: &HashEmbeddingProvider) -> Chunk {
        let embedding = self
            .embedding
            .unwrap_or_else(|| embedder.embed_text(&self.content));
        let mut chunk = Chunk::new(self.id, self.title, self.content)
            .with_source(self.source_name, self.url)
            .with_quality(self.quality_score)
            .with_embedding(embedding);
        chunk.topics.extend(self.topics);
        chunk
    }
}

/// Raw corpus file contents.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CorpusFile {
    /// Chunks for the vector store.
    pub chunks: Vec<ChunkRecord>,
    /// Graph nodes.
    pub nodes: Vec<GraphNode>,
    /// Graph edges.
    pub edges: Vec<Edge>,
}

/// A loaded corpus, ready to back an engine.
pub struct Corpus {
    /// Chunks with embeddings.
    pub vector: InMemoryVectorStore,
    /// Knowledge graph.
    pub graph: GraphData,
}

impl Corpus {
    /// Reads and builds a corpus from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        let file: CorpusFile = serde_json::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))?;
        let corpus = Self::from_file(file)?;
        log::info!(
            "Loaded corpus {}: {} chunks, {} nodes, {} edges",
            path.display(),
            corpus.vector.chunk_count(),
            corpus.graph.node_count(),
            corpus.graph.edge_count()
        );
        Ok(corpus)
    }

    /// Builds a corpus from parsed file contents.
    pub fn from_file(file: CorpusFile) -> Result<Self> {
        let embedder = HashEmbeddingProvider::default();
        let chunks: Vec<Chunk> = file
            .chunks
            .into_iter()
            .map(|record| record.into_chunk(&embedder))
            .collect();

        let mut graph = GraphData::new();
        for node in file.nodes {
            let node = match chunks.iter().find(|c| c.id == node.id) {
                Some(chunk) if node.label == NodeLabel::ChunkRef => fill_chunk_ref(node, chunk),
                _ => node,
            };
            graph.add_node(node);
        }
        for edge in file.edges {
            graph.add_edge(edge)?;
        }

        let mut vector = InMemoryVectorStore::new();
        vector.extend(chunks);
        Ok(Self { vector, graph })
    }
}

fn fill_chunk_ref(mut node: GraphNode, chunk: &Chunk) -> GraphNode {
    if node.property_str("snippet").is_none() {
        node = node.with_property("snippet", snippet(&chunk.content, CHUNK_REF_SNIPPET_LENGTH));
    }
    if node.property_str("source_name").is_none() && !chunk.source_name.is_empty() {
        node = node.with_property("source_name", chunk.source_name.clone());
    }
    if node.property_strings("topics").is_empty() && !chunk.topics.is_empty() {
        node = node.with_property("topics", chunk.topics.iter().cloned().collect::<Vec<_>>());
    }
    node
}

// ============================================================================
// Tests
// ============================================================================
