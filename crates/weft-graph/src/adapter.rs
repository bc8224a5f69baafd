//! Graph search adapter.
//!
//! [`GraphSearchAdapter`] is the engine-facing side of the graph signal:
//! it resolves seed concepts to nodes, traverses outward, and scores every
//! reached node by proximity, `1 / (1 + hops)`. It also expands concepts
//! into related terms for concept-expansion queries.
//!
//! Backend calls share the vector adapter's discipline: a pool slot, one
//! retry on `BackendUnavailable`, and the request deadline.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use weft_core::config::MAX_TRAVERSAL_DEPTH;
use weft_core::{
    ConnectionPool, EngineConfig, RequestContext, Result, RetryPolicy, SearchResult, normalize_query,
    snippet,
};

use crate::store::{GraphStore, Reached};
use crate::types::{GraphNode, NodeLabel, Relationship};

/// Default fuzzy-match threshold.
const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;

/// Default number of concurrent store calls.
const DEFAULT_POOL_SIZE: usize = 16;

/// Default snippet length in characters.
const DEFAULT_SNIPPET_LENGTH: usize = 200;

/// Proximity score for a node `hops` away from the nearest seed.
pub fn proximity_score(hops: usize) -> f32 {
    1.0 / (1.0 + hops as f32)
}

/// Relationship traversal search with pooling, retry, and deadlines.
pub struct GraphSearchAdapter {
    store: Arc<dyn GraphStore>,
    pool: ConnectionPool,
    retry: RetryPolicy,
    fuzzy_threshold: f64,
    snippet_length: usize,
}

impl GraphSearchAdapter {
    /// Creates an adapter with default pool size, retry policy, and fuzzy
    /// threshold.
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            pool: ConnectionPool::new("graph", DEFAULT_POOL_SIZE),
            retry: RetryPolicy::default(),
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            snippet_length: DEFAULT_SNIPPET_LENGTH,
        }
    }

    /// Creates an adapter configured from `config`.
    pub fn from_config(store: Arc<dyn GraphStore>, config: &EngineConfig) -> Self {
        Self::new(store)
            .with_pool(ConnectionPool::new("graph", config.graph_pool_size))
            .with_retry(RetryPolicy::once(config.retry_base_delay()))
            .with_fuzzy_threshold(config.fuzzy_match_threshold)
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

    /// Sets the minimum similarity for fuzzy name matches.
    pub fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
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

    /// Runs one store call under a pool slot, the retry policy, and the
    /// request deadline.
    async fn call<T, F, Fut>(&self, ctx: &RequestContext, label: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let pool = &self.pool;
        let op = &op;
        ctx.guard(self.retry.run(label, move || async move {
            let _slot = pool.acquire(ctx).await?;
            op().await
        }))
        .await
    }

    /// Resolves terms to nodes, in term order, without duplicates.
    async fn resolve(&self, ctx: &RequestContext, terms: &[String]) -> Result<Vec<GraphNode>> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for term in terms {
            let matched = self
                .call(ctx, "graph match", || {
                    self.store.match_nodes(term, self.fuzzy_threshold)
                })
                .await?;
            if matched.is_empty() {
                log::debug!("No graph node matches '{term}'");
            }
            for node in matched {
                if seen.insert(node.id.clone()) {
                    nodes.push(node);
                }
            }
        }
        Ok(nodes)
    }

    /// Names of vocabulary nodes (frameworks, sources, topics).
    pub async fn vocabulary(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        self.call(ctx, "graph vocabulary", || {
            self.store.node_names(&NodeLabel::VOCABULARY)
        })
        .await
    }

    /// Traverses from the nodes named by `seed_concepts` and returns up to
    /// `limit` reached nodes as results.
    ///
    /// Seeds resolve in the order given. Traversal follows edges in both
    /// directions up to `max_depth` hops (capped at 10); seeds score 1.0.
    /// Results are ordered by graph score descending, then degree descending,
    /// then id ascending.
    pub async fn graph_search(
        &self,
        ctx: &RequestContext,
        seed_concepts: &[String],
        max_depth: usize,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if seed_concepts.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let seeds = self.resolve(ctx, seed_concepts).await?;
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let depth = max_depth.min(MAX_TRAVERSAL_DEPTH);
        let seeds_ref = &seeds;
        let mut reached = self
            .call(ctx, "graph traverse", || self.store.traverse(seeds_ref, depth))
            .await?;

        reached.sort_by(|a, b| {
            a.hops
                .cmp(&b.hops)
                .then_with(|| b.node.degree.cmp(&a.node.degree))
                .then_with(|| a.node.id.cmp(&b.node.id))
        });
        reached.truncate(limit);

        log::debug!(
            "Graph search from {} seeds reached {} nodes (depth {depth})",
            seeds.len(),
            reached.len()
        );

        Ok(reached.into_iter().map(|r| self.to_result(r)).collect())
    }

    /// Terms related to `concepts` by `RELATED_TO` edges (one hop).
    ///
    /// Ordered by edge strength descending, then name; the concepts' own
    /// nodes are excluded.
    pub async fn related_terms(
        &self,
        ctx: &RequestContext,
        concepts: &[String],
        limit: usize,
    ) -> Result<Vec<String>> {
        if concepts.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let seeds = self.resolve(ctx, concepts).await?;
        let seed_ids: Vec<String> = seeds.iter().map(|n| n.id.clone()).collect();
        if seed_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids_ref = &seed_ids;
        let neighbors = self
            .call(ctx, "graph related", || {
                self.store.expand(ids_ref, Some(&[Relationship::RelatedTo]))
            })
            .await?;

        let excluded: HashSet<String> = concepts.iter().map(|c| normalize_query(c)).collect();
        let mut best: HashMap<String, f32> = HashMap::new();
        for neighbor in neighbors {
            if seed_ids.contains(&neighbor.node.id)
                || excluded.contains(&normalize_query(&neighbor.node.name))
            {
                continue;
            }
            let strength = neighbor.edge.effective_strength();
            best.entry(neighbor.node.name)
                .and_modify(|s| *s = s.max(strength))
                .or_insert(strength);
        }

        let mut terms: Vec<(String, f32)> = best.into_iter().collect();
        terms.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        terms.truncate(limit);
        Ok(terms.into_iter().map(|(name, _)| name).collect())
    }

    fn to_result(&self, reached: Reached) -> SearchResult {
        let node = reached.node;
        let text = node
            .property_str("snippet")
            .or_else(|| node.property_str("content"))
            .map(|s| snippet(s, self.snippet_length))
            .unwrap_or_default();
        let source = node.property_str("source_name").unwrap_or_default().to_string();
        let topics = node.property_strings("topics");

        SearchResult::graph(node.id, node.name, proximity_score(reached.hops))
            .with_snippet(text)
            .with_source_name(source)
            .with_topics(topics)
    }
}

impl std::fmt::Debug for GraphSearchAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphSearchAdapter")
            .field("store", &self.store.name())
            .field("pool", &self.pool)
            .field("retry", &self.retry)
            .field("fuzzy_threshold", &self.fuzzy_threshold)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{InMemoryGraphStore, Neighbor};
    use crate::types::{Edge, GraphData};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;
    use weft_core::{Error, Signal};

    fn store() -> Arc<dyn GraphStore> {
        let mut graph = GraphData::new();
        for node in [
            GraphNode::new("fastapi", "FastAPI", NodeLabel::Framework),
            GraphNode::new("starlette", "Starlette", NodeLabel::Framework),
            GraphNode::new("c1", "FastAPI OAuth2 Password Bearer", NodeLabel::ChunkRef)
                .with_property("snippet", "Use OAuth2 with Password and Bearer tokens.")
                .with_property("source_name", "FastAPI Docs")
                .with_property("topics", serde_json::json!(["Authentication"])),
            GraphNode::new("authentication", "Authentication", NodeLabel::Topic),
            GraphNode::new("oauth2", "OAuth2", NodeLabel::Topic),
            GraphNode::new("jwt", "JWT", NodeLabel::Topic),
            GraphNode::new("security", "Security", NodeLabel::Topic),
        ] {
            graph.add_node(node);
        }
        for edge in [
            Edge::new("fastapi", "c1", Relationship::Documents),
            Edge::new("c1", "authentication", Relationship::CoversTopic),
            Edge::new("fastapi", "starlette", Relationship::IntegratesWith),
            Edge::new("authentication", "oauth2", Relationship::RelatedTo).with_strength(0.9),
            Edge::new("jwt", "authentication", Relationship::RelatedTo).with_strength(0.7),
            Edge::new("authentication", "security", Relationship::RelatedTo).with_strength(0.7),
        ] {
            graph.add_edge(edge).unwrap();
        }
        Arc::new(InMemoryGraphStore::new(graph))
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Duration::from_secs(5))
    }

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Store whose every call fails as unavailable.
    struct DownStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphStore for DownStore {
        async fn match_nodes(&self, _term: &str, _threshold: f64) -> Result<Vec<GraphNode>> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Err(Error::backend_unavailable("graph", "connection refused"))
        }

        async fn expand(
            &self,
            _node_ids: &[String],
            _relationships: Option<&[Relationship]>,
        ) -> Result<Vec<Neighbor>> {
            Err(Error::backend_unavailable("graph", "connection refused"))
        }

        async fn node_names(&self, _labels: &[NodeLabel]) -> Result<Vec<String>> {
            Err(Error::backend_unavailable("graph", "connection refused"))
        }

        fn name(&self) -> &str {
            "down"
        }

        fn node_count(&self) -> usize {
            0
        }
    }

    #[test]
    fn test_proximity_score() {
        assert_eq!(proximity_score(0), 1.0);
        assert_eq!(proximity_score(1), 0.5);
        assert!((proximity_score(2) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_graph_search_scores_and_orders() {
        let adapter = GraphSearchAdapter::new(store());
        let results = adapter
            .graph_search(&ctx(), &terms(&["FastAPI", "Authentication"]), 2, 10)
            .await
            .unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        // Seeds first (auth has the higher degree), then hop 1 by degree then id.
        assert_eq!(ids[..2], ["authentication", "fastapi"]);
        let c1 = results.iter().find(|r| r.id == "c1").unwrap();
        assert_eq!(c1.graph_score, Some(0.5));
        assert_eq!(c1.source_name, "FastAPI Docs");
        assert_eq!(c1.topics, vec!["Authentication".to_string()]);
        assert!(c1.snippet.starts_with("Use OAuth2"));
        assert!(c1.found_via.contains(&Signal::Graph));

        for pair in results.windows(2) {
            assert!(pair[0].combined_score >= pair[1].combined_score);
        }
    }

    #[tokio::test]
    async fn test_graph_search_depth_and_limit() {
        let adapter = GraphSearchAdapter::new(store());
        let shallow = adapter
            .graph_search(&ctx(), &terms(&["starlette"]), 1, 10)
            .await
            .unwrap();
        let ids: Vec<_> = shallow.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["starlette", "fastapi"]);

        let limited = adapter
            .graph_search(&ctx(), &terms(&["starlette"]), 3, 2)
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_graph_search_unmatched_and_empty() {
        let adapter = GraphSearchAdapter::new(store());
        assert!(
            adapter
                .graph_search(&ctx(), &terms(&["kubernetes"]), 2, 10)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(adapter.graph_search(&ctx(), &[], 2, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_graph_search_fuzzy_seed() {
        let adapter = GraphSearchAdapter::new(store());
        let results = adapter
            .graph_search(&ctx(), &terms(&["Starlete"]), 0, 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "starlette");
    }

    #[tokio::test]
    async fn test_related_terms_ordering() {
        let adapter = GraphSearchAdapter::new(store());
        let related = adapter
            .related_terms(&ctx(), &terms(&["authentication"]), 10)
            .await
            .unwrap();
        assert_eq!(related, vec!["OAuth2", "JWT", "Security"]);

        let capped = adapter
            .related_terms(&ctx(), &terms(&["authentication"]), 1)
            .await
            .unwrap();
        assert_eq!(capped, vec!["OAuth2"]);
    }

    #[tokio::test]
    async fn test_related_terms_excludes_input_concepts() {
        let adapter = GraphSearchAdapter::new(store());
        let related = adapter
            .related_terms(&ctx(), &terms(&["authentication", "oauth2"]), 10)
            .await
            .unwrap();
        assert_eq!(related, vec!["JWT", "Security"]);
    }

    #[tokio::test]
    async fn test_vocabulary() {
        let adapter = GraphSearchAdapter::new(store());
        let names = adapter.vocabulary(&ctx()).await.unwrap();
        assert!(names.contains(&"FastAPI".to_string()));
        assert!(!names.iter().any(|n| n.contains("Password")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_store_retried_then_surfaces() {
        let down = Arc::new(DownStore {
            calls: AtomicUsize::new(0),
        });
        let adapter = GraphSearchAdapter::new(down.clone());
        let err = adapter
            .graph_search(&ctx(), &terms(&["fastapi"]), 2, 10)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(down.calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn test_from_config() {
        let config = EngineConfig {
            graph_pool_size: 4,
            fuzzy_match_threshold: 0.9,
            ..EngineConfig::default()
        };
        let adapter = GraphSearchAdapter::from_config(store(), &config);
        assert_eq!(adapter.pool().size(), 4);
        assert_eq!(adapter.fuzzy_threshold, 0.9);
        assert_eq!(adapter.store_name(), "in-memory");
    }
}
