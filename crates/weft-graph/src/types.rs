//! Core graph types for the knowledge graph.
//!
//! Nodes are frameworks, documentation sources, topics, and references to
//! ingested chunks. A `ChunkRef` node shares its id with the chunk it points
//! at, so a chunk reached by traversal fuses with the same chunk found by
//! vector similarity.

use std::collections::HashMap;
use std::fmt;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use weft_core::{Error, Result, normalize_query};

// ============================================================================
// NodeLabel enum
// ============================================================================

/// Kind of a graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    /// A software framework or library (e.g. FastAPI).
    Framework,
    /// A documentation source.
    Source,
    /// A subject area (e.g. Authentication).
    Topic,
    /// A reference to an ingested chunk; its id is the chunk id.
    ChunkRef,
}

impl NodeLabel {
    /// Labels whose node names are meaningful query vocabulary.
    pub const VOCABULARY: [NodeLabel; 3] = [NodeLabel::Framework, NodeLabel::Source, NodeLabel::Topic];

    /// Returns the label name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Framework => "Framework",
            Self::Source => "Source",
            Self::Topic => "Topic",
            Self::ChunkRef => "ChunkRef",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Relationship enum
// ============================================================================

/// Relationship types for graph edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relationship {
    /// A source or framework documents a chunk or topic.
    Documents,
    /// Two frameworks integrate with each other.
    IntegratesWith,
    /// Two concepts are related; carries a strength.
    RelatedTo,
    /// A chunk or source covers a topic.
    CoversTopic,
}

impl Relationship {
    /// Strength assumed when an edge carries none.
    pub fn default_strength(&self) -> f32 {
        match self {
            Self::Documents => 1.0,
            Self::CoversTopic => 0.9,
            Self::IntegratesWith => 0.8,
            Self::RelatedTo => 0.5,
        }
    }

    /// Returns the relationship name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Documents => "DOCUMENTS",
            Self::IntegratesWith => "INTEGRATES_WITH",
            Self::RelatedTo => "RELATED_TO",
            Self::CoversTopic => "COVERS_TOPIC",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// GraphNode struct
// ============================================================================

/// A node in the knowledge graph.
///
/// `degree` is computed when a node is read out of a graph and is never
/// stored or serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique identifier.
    pub id: String,
    /// Display and match name.
    pub name: String,
    /// Node kind.
    pub label: NodeLabel,
    /// Free-form attributes (`snippet`, `source_name`, `topics`, `url`...).
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    /// Number of incident edges, both directions.
    #[serde(skip)]
    pub degree: usize,
}

impl GraphNode {
    /// Creates a node with no properties.
    pub fn new(id: impl Into<String>, name: impl Into<String>, label: NodeLabel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            label,
            properties: HashMap::new(),
            degree: 0,
        }
    }

    /// Adds a property.
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns a string property, if present.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(serde_json::Value::as_str)
    }

    /// Returns a string-list property (e.g. `topics`), skipping non-strings.
    pub fn property_strings(&self, key: &str) -> Vec<String> {
        match self.properties.get(key) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// Edge struct
// ============================================================================

/// A directed edge between two nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Source node ID.
    pub from: String,
    /// Target node ID.
    pub to: String,
    /// Type of relationship.
    pub relationship: Relationship,
    /// Optional strength in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
}

impl Edge {
    /// Creates an edge without an explicit strength.
    pub fn new(from: impl Into<String>, to: impl Into<String>, relationship: Relationship) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relationship,
            strength: None,
        }
    }

    /// Sets an explicit strength.
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = Some(strength);
        self
    }

    /// Explicit strength, or the relationship default.
    pub fn effective_strength(&self) -> f32 {
        self.strength
            .unwrap_or_else(|| self.relationship.default_strength())
    }
}

// ============================================================================
// GraphData struct
// ============================================================================

/// Core graph data structure.
///
/// Wraps a petgraph `DiGraph` with lookup tables for id and name access.
#[derive(Clone, Debug, Default)]
pub struct GraphData {
    /// The underlying directed graph.
    pub graph: DiGraph<GraphNode, Edge>,
    /// Lookup table: node ID → petgraph NodeIndex.
    pub node_indices: HashMap<String, NodeIndex>,
    /// Lookup table: normalized node name → nodes carrying it.
    pub name_index: HashMap<String, Vec<NodeIndex>>,
    /// All edges as a flat list (for serialization).
    pub edges: Vec<Edge>,
}

impl GraphData {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Gets the petgraph NodeIndex for a node ID.
    pub fn get_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_indices.get(id).copied()
    }

    /// Checks if a node exists.
    pub fn contains_node(&self, id: &str) -> bool {
        self.node_indices.contains_key(id)
    }

    /// Number of edges touching `idx`, both directions.
    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Outgoing).count()
            + self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    /// Reads a node out of the graph with its degree filled in.
    pub fn node_at(&self, idx: NodeIndex) -> Option<GraphNode> {
        self.graph.node_weight(idx).map(|node| GraphNode {
            degree: self.degree(idx),
            ..node.clone()
        })
    }

    /// Gets a node by ID, with its degree filled in.
    pub fn get_node(&self, id: &str) -> Option<GraphNode> {
        self.get_index(id).and_then(|idx| self.node_at(idx))
    }

    /// Returns an iterator over all stored nodes (degree not filled in).
    pub fn iter_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    /// Returns an iterator over all edges.
    pub fn iter_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Nodes whose normalized name equals `normalized_name`.
    pub fn indices_named(&self, normalized_name: &str) -> &[NodeIndex] {
        self.name_index
            .get(normalized_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Add a node to the graph.
    ///
    /// If a node with the same ID already exists, returns its existing index.
    pub fn add_node(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&existing_idx) = self.node_indices.get(&node.id) {
            return existing_idx;
        }
        let id = node.id.clone();
        let name_key = normalize_query(&node.name);
        let idx = self.graph.add_node(GraphNode { degree: 0, ..node });
        self.node_indices.insert(id, idx);
        self.name_index.entry(name_key).or_default().push(idx);
        idx
    }

    /// Add an edge between two nodes identified by ID.
    ///
    /// Both nodes must already exist in the graph.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        let from_idx = self
            .get_index(&edge.from)
            .ok_or_else(|| Error::not_found("node", &edge.from))?;
        let to_idx = self
            .get_index(&edge.to)
            .ok_or_else(|| Error::not_found("node", &edge.to))?;

        self.graph.add_edge(from_idx, to_idx, edge.clone());
        self.edges.push(edge);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Relationship tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_relationship_names() {
        assert_eq!(Relationship::Documents.name(), "DOCUMENTS");
        assert_eq!(Relationship::IntegratesWith.name(), "INTEGRATES_WITH");
        assert_eq!(Relationship::RelatedTo.to_string(), "RELATED_TO");
        assert_eq!(Relationship::CoversTopic.name(), "COVERS_TOPIC");
    }

    #[test]
    fn test_relationship_serde_matches_name() {
        for rel in [
            Relationship::Documents,
            Relationship::IntegratesWith,
            Relationship::RelatedTo,
            Relationship::CoversTopic,
        ] {
            let json = serde_json::to_string(&rel).unwrap();
            assert_eq!(json, format!("\"{}\"", rel.name()));
        }
    }

    #[test]
    fn test_edge_strength() {
        let edge = Edge::new("a", "b", Relationship::RelatedTo);
        assert_eq!(edge.effective_strength(), 0.5);
        assert_eq!(edge.with_strength(0.9).effective_strength(), 0.9);
    }

    // ------------------------------------------------------------------------
    // GraphNode tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_node_properties() {
        let node = GraphNode::new("c1", "OAuth2", NodeLabel::ChunkRef)
            .with_property("snippet", "Password bearer")
            .with_property("topics", serde_json::json!(["Authentication", 3]));
        assert_eq!(node.property_str("snippet"), Some("Password bearer"));
        assert_eq!(node.property_strings("topics"), vec!["Authentication"]);
        assert!(node.property_str("missing").is_none());
    }

    #[test]
    fn test_degree_not_serialized() {
        let mut node = GraphNode::new("t", "Topic", NodeLabel::Topic);
        node.degree = 7;
        let json = serde_json::to_string(&node).unwrap();
        assert!(!json.contains("degree"));
        let parsed: GraphNode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.degree, 0);
    }

    // ------------------------------------------------------------------------
    // GraphData tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_add_node_is_idempotent() {
        let mut graph = GraphData::new();
        let a = graph.add_node(GraphNode::new("fastapi", "FastAPI", NodeLabel::Framework));
        let b = graph.add_node(GraphNode::new("fastapi", "Other", NodeLabel::Topic));
        assert_eq!(a, b);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.indices_named("fastapi"), &[a]);
        assert!(graph.indices_named("other").is_empty());
    }

    #[test]
    fn test_add_edge_requires_nodes() {
        let mut graph = GraphData::new();
        graph.add_node(GraphNode::new("a", "A", NodeLabel::Topic));
        let err = graph
            .add_edge(Edge::new("a", "missing", Relationship::RelatedTo))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_degree_counts_both_directions() {
        let mut graph = GraphData::new();
        graph.add_node(GraphNode::new("a", "A", NodeLabel::Topic));
        graph.add_node(GraphNode::new("b", "B", NodeLabel::Topic));
        graph.add_node(GraphNode::new("c", "C", NodeLabel::Topic));
        graph
            .add_edge(Edge::new("a", "b", Relationship::RelatedTo))
            .unwrap();
        graph
            .add_edge(Edge::new("c", "b", Relationship::RelatedTo))
            .unwrap();

        assert_eq!(graph.get_node("b").unwrap().degree, 2);
        assert_eq!(graph.get_node("a").unwrap().degree, 1);
        assert_eq!(graph.iter_edges().count(), 2);
        assert!(graph.get_node("zzz").is_none());
    }
}
