//! Graph algorithms used by the in-memory store.
//!
//! Provides:
//! - Node resolution (exact name/id match, then fuzzy name match)
//! - One-hop frontier expansion in both edge directions
//! - Multi-source, level-synchronous neighborhood traversal
//!
//! All algorithms are generic and operate on `GraphData`.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use weft_core::config::MAX_TRAVERSAL_DEPTH;
use weft_core::{concept_slug, normalize_query};

use crate::types::{Edge, GraphData, Relationship};

// ============================================================================
// Result types
// ============================================================================

/// A node reached by following one edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hop<'a> {
    /// The node the edge was followed from.
    pub from: NodeIndex,
    /// The node reached.
    pub to: NodeIndex,
    /// The edge followed (either direction).
    pub edge: &'a Edge,
}

// ============================================================================
// Algorithms
// ============================================================================

/// Resolve a free-text term to graph nodes.
///
/// Exact matches win: a node whose normalized name equals the normalized
/// term, or whose id equals it in kebab form. If there are none, nodes whose
/// name has normalized Levenshtein similarity `>= fuzzy_threshold` are
/// returned, best match first (ties by id).
pub fn match_nodes(graph: &GraphData, term: &str, fuzzy_threshold: f64) -> Vec<NodeIndex> {
    let normalized = normalize_query(term);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut exact: Vec<NodeIndex> = graph.indices_named(&normalized).to_vec();
    for candidate in [normalized.clone(), concept_slug(&normalized)] {
        if let Some(idx) = graph.get_index(&candidate) {
            if !exact.contains(&idx) {
                exact.push(idx);
            }
        }
    }
    if !exact.is_empty() {
        return exact;
    }

    let mut fuzzy: Vec<(NodeIndex, f64)> = graph
        .graph
        .node_indices()
        .filter_map(|idx| {
            let name = normalize_query(&graph.graph[idx].name);
            let similarity = strsim::normalized_levenshtein(&name, &normalized);
            (similarity >= fuzzy_threshold).then_some((idx, similarity))
        })
        .collect();

    fuzzy.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| graph.graph[a.0].id.cmp(&graph.graph[b.0].id))
    });
    fuzzy.into_iter().map(|(idx, _)| idx).collect()
}

/// Follow every edge touching the frontier, in both directions.
///
/// `relationship_filter` limits which edges are followed. Hops are returned
/// in frontier order, outgoing before incoming.
pub fn expand_frontier<'a>(
    graph: &'a GraphData,
    frontier: &[NodeIndex],
    relationship_filter: Option<&[Relationship]>,
) -> Vec<Hop<'a>> {
    let allowed = |edge: &Edge| relationship_filter.is_none_or(|f| f.contains(&edge.relationship));
    let mut hops = Vec::new();

    for &current in frontier {
        for edge_ref in graph.graph.edges_directed(current, Direction::Outgoing) {
            if allowed(edge_ref.weight()) {
                hops.push(Hop {
                    from: current,
                    to: edge_ref.target(),
                    edge: edge_ref.weight(),
                });
            }
        }
        for edge_ref in graph.graph.edges_directed(current, Direction::Incoming) {
            if allowed(edge_ref.weight()) {
                hops.push(Hop {
                    from: current,
                    to: edge_ref.source(),
                    edge: edge_ref.weight(),
                });
            }
        }
    }

    hops
}

/// Hop distance from the nearest seed for every node within `max_depth`.
///
/// Traversal is level-synchronous: all seeds start at hop 0 and each level
/// is expanded completely before the next, so each node's recorded distance
/// is its minimum over every seed and path. Depth is capped at
/// `MAX_TRAVERSAL_DEPTH`.
pub fn multi_source_distances(
    graph: &GraphData,
    seeds: &[NodeIndex],
    max_depth: usize,
) -> HashMap<NodeIndex, usize> {
    let max_depth = max_depth.min(MAX_TRAVERSAL_DEPTH);
    let mut distances: HashMap<NodeIndex, usize> = HashMap::new();
    let mut frontier: Vec<NodeIndex> = Vec::new();

    for &seed in seeds {
        if distances.insert(seed, 0).is_none() {
            frontier.push(seed);
        }
    }

    for depth in 1..=max_depth {
        if frontier.is_empty() {
            break;
        }
        let mut next = Vec::new();
        let mut seen_this_level = HashSet::new();
        for hop in expand_frontier(graph, &frontier, None) {
            if !distances.contains_key(&hop.to) && seen_this_level.insert(hop.to) {
                next.push(hop.to);
            }
        }
        for &idx in &next {
            distances.insert(idx, depth);
        }
        frontier = next;
    }

    distances
}

// ============================================================================
// Tests
// ============================================================================
