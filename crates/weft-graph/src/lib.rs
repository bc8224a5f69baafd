//! Knowledge graph search for the Weft query engine.
//!
//! The graph links frameworks, documentation sources, topics, and chunk
//! references. This crate provides:
//!
//! - [`GraphData`]: petgraph-backed storage with id and name lookup
//! - [`GraphStore`]: the backend seam (`match_nodes`, `expand`, `traverse`)
//! - [`GraphSearchAdapter`]: the engine-facing graph signal
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use weft_core::RequestContext;
//! use weft_graph::{Edge, GraphData, GraphNode, GraphSearchAdapter, InMemoryGraphStore, NodeLabel, Relationship};
//!
//! # tokio_test::block_on(async {
//! let mut graph = GraphData::new();
//! graph.add_node(GraphNode::new("fastapi", "FastAPI", NodeLabel::Framework));
//! graph.add_node(GraphNode::new("auth", "Authentication", NodeLabel::Topic));
//! graph.add_edge(Edge::new("fastapi", "auth", Relationship::CoversTopic)).unwrap();
//!
//! let adapter = GraphSearchAdapter::new(Arc::new(InMemoryGraphStore::new(graph)));
//! let ctx = RequestContext::new(Duration::from_secs(1));
//! let results = adapter
//!     .graph_search(&ctx, &["fastapi".to_string()], 2, 10)
//!     .await
//!     .unwrap();
//! assert_eq!(results[1].id, "auth");
//! assert_eq!(results[1].graph_score, Some(0.5));
//! # });
//! ```

pub mod adapter;
pub mod algorithms;
pub mod store;
pub mod types;

pub use adapter::{GraphSearchAdapter, proximity_score};
pub use store::{GraphStore, InMemoryGraphStore, Neighbor, Reached};
pub use types::{Edge, GraphData, GraphNode, NodeLabel, Relationship};
