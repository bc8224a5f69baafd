//! Graph store trait and in-memory implementation.
//!
//! A [`GraphStore`] answers three read-only questions: which nodes a term
//! names, what lies one hop from a set of nodes, and (as a convenience with
//! a default built on `expand`) what lies within N hops.
//!
//! # Backends
//!
//! - [`InMemoryGraphStore`]: petgraph-backed [`GraphData`]

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use weft_core::Result;
use weft_core::config::MAX_TRAVERSAL_DEPTH;

use crate::algorithms::{expand_frontier, match_nodes, multi_source_distances};
use crate::types::{Edge, GraphData, GraphNode, NodeLabel, Relationship};

/// A node reached by one hop from a frontier node.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    /// Id of the frontier node the edge was followed from.
    pub from: String,
    /// The edge followed.
    pub edge: Edge,
    /// The node reached, degree filled in.
    pub node: GraphNode,
}

/// A node with its hop distance from the nearest seed.
#[derive(Clone, Debug, PartialEq)]
pub struct Reached {
    /// The node, degree filled in.
    pub node: GraphNode,
    /// Minimum hop count from any seed (0 for seeds).
    pub hops: usize,
}

/// Abstract graph backend.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Resolves a term to nodes: exact name/id match, else fuzzy name match
    /// with normalized similarity `>= fuzzy_threshold`.
    async fn match_nodes(&self, term: &str, fuzzy_threshold: f64) -> Result<Vec<GraphNode>>;

    /// Follows one hop, both edge directions, from each of `node_ids`.
    async fn expand(
        &self,
        node_ids: &[String],
        relationships: Option<&[Relationship]>,
    ) -> Result<Vec<Neighbor>>;

    /// Names of every node carrying one of `labels`.
    async fn node_names(&self, labels: &[NodeLabel]) -> Result<Vec<String>>;

    /// Every node within `max_depth` hops of a seed, with its minimum hop
    /// count. Seeds themselves are included at hop 0.
    ///
    /// The default runs a level-synchronous traversal over [`expand`].
    ///
    /// [`expand`]: GraphStore::expand
    async fn traverse(&self, seeds: &[GraphNode], max_depth: usize) -> Result<Vec<Reached>> {
        let max_depth = max_depth.min(MAX_TRAVERSAL_DEPTH);
        let mut reached: Vec<Reached> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier: Vec<String> = Vec::new();

        for seed in seeds {
            if visited.insert(seed.id.clone()) {
                frontier.push(seed.id.clone());
                reached.push(Reached {
                    node: seed.clone(),
                    hops: 0,
                });
            }
        }

        for depth in 1..=max_depth {
            if frontier.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for neighbor in self.expand(&frontier, None).await? {
                if visited.insert(neighbor.node.id.clone()) {
                    next.push(neighbor.node.id.clone());
                    reached.push(Reached {
                        node: neighbor.node,
                        hops: depth,
                    });
                }
            }
            frontier = next;
        }

        Ok(reached)
    }

    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Number of stored nodes.
    fn node_count(&self) -> usize;
}

// ============================================================================
// InMemoryGraphStore
// ============================================================================

/// Graph store over an in-memory [`GraphData`].
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    data: GraphData,
}

impl InMemoryGraphStore {
    /// Wraps a built graph.
    pub fn new(data: GraphData) -> Self {
        Self { data }
    }

    /// The underlying graph.
    pub fn data(&self) -> &GraphData {
        &self.data
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn match_nodes(&self, term: &str, fuzzy_threshold: f64) -> Result<Vec<GraphNode>> {
        Ok(match_nodes(&self.data, term, fuzzy_threshold)
            .into_iter()
            .filter_map(|idx| self.data.node_at(idx))
            .collect())
    }

    async fn expand(
        &self,
        node_ids: &[String],
        relationships: Option<&[Relationship]>,
    ) -> Result<Vec<Neighbor>> {
        let frontier: Vec<_> = node_ids
            .iter()
            .filter_map(|id| self.data.get_index(id))
            .collect();

        Ok(expand_frontier(&self.data, &frontier, relationships)
            .into_iter()
            .filter_map(|hop| {
                let node = self.data.node_at(hop.to)?;
                let from = self.data.graph.node_weight(hop.from)?.id.clone();
                Some(Neighbor {
                    from,
                    edge: hop.edge.clone(),
                    node,
                })
            })
            .collect())
    }

    async fn node_names(&self, labels: &[NodeLabel]) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .data
            .iter_nodes()
            .filter(|node| labels.contains(&node.label))
            .map(|node| node.name.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn traverse(&self, seeds: &[GraphNode], max_depth: usize) -> Result<Vec<Reached>> {
        let seed_indices: Vec<_> = seeds
            .iter()
            .filter_map(|seed| self.data.get_index(&seed.id))
            .collect();
        let distances: HashMap<_, _> = multi_source_distances(&self.data, &seed_indices, max_depth);

        Ok(distances
            .into_iter()
            .filter_map(|(idx, hops)| self.data.node_at(idx).map(|node| Reached { node, hops }))
            .collect())
    }

    fn name(&self) -> &str {
        "in-memory"
    }

    fn node_count(&self) -> usize {
        self.data.node_count()
    }
}

// ============================================================================
// Tests
// ============================================================================
