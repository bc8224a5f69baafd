//! The hybrid query engine: analysis, caching, strategy dispatch, fusion.
//!
//! ```text
//! query ─▶ analyze ─▶ cache lookup ──hit──────────────────────────▶ response
//!                          │
//!                          └─miss─▶ strategy executor ─▶ fuse ─▶ cache write ─▶ response
//! ```
//!
//! One failed signal degrades the response instead of failing it; only when
//! neither signal can be produced does the request fail. Degraded responses
//! are never cached, and a fresh analysis is cached only once its request
//! succeeds. Cache calls run under the request deadline and cancellation like
//! every backend call: a read cut off by the deadline is a miss.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use weft_cache::{CacheBackend, CacheLayer, CacheMetrics, InMemoryCacheBackend};
use weft_core::{
    CancellationToken, EngineConfig, Error, RequestContext, Result, SearchResult, Strategy,
};
use weft_graph::{GraphSearchAdapter, GraphStore};
use weft_vector::{EmbeddingProvider, HashEmbeddingProvider, VectorSearchAdapter, VectorStore};

use crate::analyzer::{QueryAnalysis, QueryAnalyzer};
use crate::fusion::{FusionWeights, ResultFusionEngine};
use crate::metrics::{
    EngineStats, EngineStatsSnapshot, PhaseTracker, RequestPhase, SearchMetrics, SignalStatus,
    millis,
};
use crate::strategy::{Dispatch, ExecutionContext, SignalOutcome, executor_for};
use crate::vocabulary::ConceptVocabulary;

/// Cache namespace for fused result sets.
pub const RESULTS_NAMESPACE: &str = "results";

/// Cache namespace for query analyses.
pub const ANALYSIS_NAMESPACE: &str = "analysis";

/// Cache key for a result set.
///
/// Unique per normalized query, strategy, limit, and quality threshold.
pub fn result_cache_key(
    normalized_query: &str,
    strategy: Strategy,
    limit: usize,
    quality_threshold: f32,
) -> String {
    let material = format!("{strategy}|{limit}|{quality_threshold:.4}|{normalized_query}");
    blake3::hash(material.as_bytes()).to_hex().to_string()
}

/// Cache key for a query analysis. Operators are case-sensitive, so only
/// whitespace is collapsed.
fn analysis_cache_key(query: &str) -> Option<String> {
    let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(blake3::hash(collapsed.as_bytes()).to_hex().to_string())
}

// ============================================================================
// Options and response
// ============================================================================

/// Per-request overrides.
#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    /// Strategy; `None` uses the configured default, then the analyzer's
    /// recommendation.
    pub strategy: Option<Strategy>,
    /// Maximum results; `None` uses the configured default.
    pub limit: Option<usize>,
    /// Minimum chunk quality; `None` uses the configured default.
    pub quality_threshold: Option<f32>,
    /// Caller token; cancelling it aborts the request.
    pub cancel: Option<CancellationToken>,
}

impl SearchOptions {
    /// Options with every field defaulted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces a strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Sets the result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the quality threshold.
    pub fn with_quality_threshold(mut self, threshold: f32) -> Self {
        self.quality_threshold = Some(threshold);
        self
    }

    /// Ties the request to a caller cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Ranked results with the analysis and metrics that produced them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Fused results, best first.
    pub results: Vec<SearchResult>,
    /// Request timing and outcome.
    pub metrics: SearchMetrics,
    /// How the query was analyzed.
    pub analysis: QueryAnalysis,
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`HybridQueryEngine`] from its backends.
///
/// The vector and graph stores are required. The embedder defaults to
/// [`HashEmbeddingProvider`], the cache backend to
/// [`InMemoryCacheBackend`], and the vocabulary to the graph's node names.
#[derive(Default)]
pub struct HybridQueryEngineBuilder {
    config: EngineConfig,
    vector_store: Option<Arc<dyn VectorStore>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    graph_store: Option<Arc<dyn GraphStore>>,
    cache_backend: Option<Arc<dyn CacheBackend>>,
    vocabulary: Option<ConceptVocabulary>,
}

impl HybridQueryEngineBuilder {
    /// Sets the configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the vector store.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Sets the embedding provider.
    pub fn embedder(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(provider);
        self
    }

    /// Sets the graph store.
    pub fn graph_store(mut self, store: Arc<dyn GraphStore>) -> Self {
        self.graph_store = Some(store);
        self
    }

    /// Sets the cache backend.
    pub fn cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    /// Uses an explicit vocabulary instead of the graph's node names.
    pub fn vocabulary(mut self, vocabulary: ConceptVocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    /// Validates the configuration and builds the engine.
    pub async fn build(self) -> Result<HybridQueryEngine> {
        let config = self.config;
        config.validate()?;
        let weights = FusionWeights::from_config(&config)?;

        let vector_store = self
            .vector_store
            .ok_or_else(|| Error::config("vector store is required"))?;
        let graph_store = self
            .graph_store
            .ok_or_else(|| Error::config("graph store is required"))?;
        let embedder = self
            .embedder
            .unwrap_or_else(|| Arc::new(HashEmbeddingProvider::default()));
        let cache_backend = self
            .cache_backend
            .unwrap_or_else(|| Arc::new(InMemoryCacheBackend::new()));

        let vector = VectorSearchAdapter::from_config(vector_store, embedder, &config);
        let graph = GraphSearchAdapter::from_config(graph_store, &config);
        let cache = CacheLayer::from_config(cache_backend, &config);

        let vocabulary = match self.vocabulary {
            Some(vocabulary) => vocabulary,
            None => {
                let ctx = RequestContext::new(config.request_deadline());
                ConceptVocabulary::from_graph(&graph, &ctx).await?
            }
        };
        let analyzer = QueryAnalyzer::from_config(Arc::new(vocabulary), &config);

        log::info!(
            "Query engine ready: vector store '{}', graph store '{}', cache '{}', {} concepts",
            vector.store_name(),
            graph.store_name(),
            cache.backend_name(),
            analyzer.vocabulary().len()
        );

        Ok(HybridQueryEngine {
            config,
            analyzer,
            vector,
            graph,
            cache,
            weights,
            stats: EngineStats::default(),
        })
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Answers queries by fusing vector similarity and graph proximity.
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct HybridQueryEngine {
    config: EngineConfig,
    analyzer: QueryAnalyzer,
    vector: VectorSearchAdapter,
    graph: GraphSearchAdapter,
    cache: CacheLayer,
    weights: FusionWeights,
    stats: EngineStats,
}

impl HybridQueryEngine {
    /// Starts a builder.
    pub fn builder() -> HybridQueryEngineBuilder {
        HybridQueryEngineBuilder::default()
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The query analyzer.
    pub fn analyzer(&self) -> &QueryAnalyzer {
        &self.analyzer
    }

    /// Request counters.
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Cache counters and breaker state.
    pub fn cache_stats(&self) -> CacheMetrics {
        self.cache.stats()
    }

    /// Autocomplete suggestions for `partial`.
    pub fn suggest(&self, partial: &str) -> Vec<String> {
        self.analyzer.suggest(partial)
    }

    /// Analyzes `query`, reusing a cached analysis when one exists.
    pub async fn analyze(&self, query: &str) -> Result<QueryAnalysis> {
        let ctx = RequestContext::new(self.config.request_deadline());
        let (analysis, unsaved) = self.lookup_analysis(query, &ctx).await?;
        self.save_analysis(&ctx, unsaved, &analysis).await?;
        Ok(analysis)
    }

    /// A cached analysis, or a fresh one with the key it should be cached
    /// under once the request succeeds.
    async fn lookup_analysis(
        &self,
        query: &str,
        ctx: &RequestContext,
    ) -> Result<(QueryAnalysis, Option<String>)> {
        let Some(key) = analysis_cache_key(query) else {
            return Ok((self.analyzer.analyze(query)?, None));
        };
        if let Some(analysis) = self
            .cache_get::<QueryAnalysis>(ctx, &key, ANALYSIS_NAMESPACE)
            .await?
        {
            return Ok((analysis, None));
        }
        Ok((self.analyzer.analyze(query)?, Some(key)))
    }

    async fn save_analysis(
        &self,
        ctx: &RequestContext,
        key: Option<String>,
        analysis: &QueryAnalysis,
    ) -> Result<()> {
        match key {
            Some(key) => {
                let ttl = self.config.analysis_ttl();
                self.cache_set(ctx, &key, analysis, ANALYSIS_NAMESPACE, ttl).await
            }
            None => Ok(()),
        }
    }

    /// Reads the cache under the request's deadline and cancellation.
    ///
    /// Running out of time reads as a miss; cancellation ends the request.
    async fn cache_get<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        key: &str,
        namespace: &str,
    ) -> Result<Option<T>> {
        match ctx.guard(async { Ok(self.cache.get::<T>(key, namespace).await) }).await {
            Err(Error::DeadlineExceeded { elapsed_ms }) => {
                log::warn!("Cache read in '{namespace}' cut off by the deadline at {elapsed_ms}ms");
                Ok(None)
            }
            other => other,
        }
    }

    /// Writes the cache under the request's deadline and cancellation.
    async fn cache_set<T: Serialize + Sync + ?Sized>(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: &T,
        namespace: &str,
        ttl: Duration,
    ) -> Result<()> {
        let write = async {
            self.cache.set(key, value, namespace, ttl).await;
            Ok(())
        };
        match ctx.guard(write).await {
            Err(Error::DeadlineExceeded { elapsed_ms }) => {
                log::warn!("Cache write in '{namespace}' cut off by the deadline at {elapsed_ms}ms");
                Ok(())
            }
            other => other,
        }
    }

    /// Searches for `query`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidQuery`] for an empty query, a zero limit, or a
    ///   quality threshold outside `[0, 1]`
    /// - [`Error::BothBackendsUnavailable`] when neither signal could run
    /// - [`Error::Cancelled`] when the caller's token fires
    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResponse> {
        let deadline = self.config.request_deadline();
        let ctx = match &options.cancel {
            Some(token) => RequestContext::with_parent(deadline, token),
            None => RequestContext::new(deadline),
        };

        let result = self.run(query, &options, &ctx).await;

        match &result {
            Ok(response) => {
                let budget = self.config.latency_budget();
                let over_budget = response.metrics.total_ms > millis(budget);
                if over_budget {
                    log::warn!(
                        "Query '{}' took {:.1}ms, over the {}ms budget ({})",
                        response.analysis.normalized_query,
                        response.metrics.total_ms,
                        budget.as_millis(),
                        response.metrics.strategy
                    );
                }
                self.stats.record(&response.metrics, over_budget);
            }
            Err(e) => {
                log::debug!("Search failed: {e}");
                self.stats.record_failure(ctx.elapsed());
            }
        }

        result
    }

    async fn run(
        &self,
        query: &str,
        options: &SearchOptions,
        ctx: &RequestContext,
    ) -> Result<SearchResponse> {
        let mut tracker = PhaseTracker::start();

        let limit = options.limit.unwrap_or(self.config.default_limit);
        if limit == 0 {
            return Err(Error::invalid_query("limit must be at least 1"));
        }
        let quality_threshold = options
            .quality_threshold
            .unwrap_or(self.config.quality_threshold);
        if !(0.0..=1.0).contains(&quality_threshold) {
            return Err(Error::invalid_query(format!(
                "quality threshold {quality_threshold} is outside [0, 1]"
            )));
        }

        let (analysis, unsaved_analysis) = self.lookup_analysis(query, ctx).await?;
        let strategy = options
            .strategy
            .or(self.config.default_strategy)
            .unwrap_or(analysis.recommended_strategy);

        tracker.advance(RequestPhase::CacheLookup);
        let key = result_cache_key(&analysis.normalized_query, strategy, limit, quality_threshold);
        if let Some(results) = self
            .cache_get::<Vec<SearchResult>>(ctx, &key, RESULTS_NAMESPACE)
            .await?
        {
            self.save_analysis(ctx, unsaved_analysis, &analysis).await?;
            tracker.advance(RequestPhase::Done);
            log::debug!("Cache hit for '{}' ({strategy})", analysis.normalized_query);
            let metrics = SearchMetrics {
                total_ms: millis(tracker.elapsed()),
                analysis_ms: millis(tracker.time_in(RequestPhase::Analyzing)),
                cache_ms: millis(tracker.time_in(RequestPhase::CacheLookup)),
                semantic_ms: 0.0,
                graph_ms: 0.0,
                fusion_ms: 0.0,
                cache_hit: true,
                degraded: false,
                strategy,
                semantic_status: SignalStatus::Skipped,
                graph_status: SignalStatus::Skipped,
            };
            return Ok(SearchResponse {
                results,
                metrics,
                analysis,
            });
        }

        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tracker.advance(RequestPhase::Dispatching);
        let cx = ExecutionContext {
            request: ctx,
            analysis: &analysis,
            limit,
            quality_threshold,
            max_depth: self.config.max_traversal_depth,
            seed_top_k: self.config.seed_top_k,
            max_expansion_terms: self.config.max_expansion_terms,
            vector: &self.vector,
            graph: &self.graph,
        };
        let dispatch = executor_for(strategy).execute(&cx).await;

        if ctx.is_cancelled() {
            log::debug!("Search for '{}' cancelled", analysis.normalized_query);
            return Err(Error::Cancelled);
        }

        let dispatch = check_dispatch(dispatch)?;
        let degraded = dispatch.is_degraded();
        let semantic_status = dispatch.semantic.status();
        let graph_status = dispatch.graph.status();
        if degraded {
            log::warn!(
                "Degraded response for '{}' ({strategy}): semantic {}, graph {}",
                analysis.normalized_query,
                dispatch.semantic.describe(),
                dispatch.graph.describe()
            );
        }

        tracker.advance(RequestPhase::Fusing);
        let results = ResultFusionEngine::fuse(
            dispatch.semantic.into_hits(),
            dispatch.graph.into_hits(),
            &self.weights,
            limit,
        );

        tracker.advance(RequestPhase::CacheWrite);
        if !degraded {
            let ttl = self.config.cache_ttl();
            self.cache_set(ctx, &key, &results, RESULTS_NAMESPACE, ttl).await?;
        }
        self.save_analysis(ctx, unsaved_analysis, &analysis).await?;
        tracker.advance(RequestPhase::Done);

        let metrics = SearchMetrics {
            total_ms: millis(tracker.elapsed()),
            analysis_ms: millis(tracker.time_in(RequestPhase::Analyzing)),
            cache_ms: millis(
                tracker.time_in(RequestPhase::CacheLookup) + tracker.time_in(RequestPhase::CacheWrite),
            ),
            semantic_ms: millis(dispatch.semantic_time),
            graph_ms: millis(dispatch.graph_time),
            fusion_ms: millis(tracker.time_in(RequestPhase::Fusing)),
            cache_hit: false,
            degraded,
            strategy,
            semantic_status,
            graph_status,
        };

        log::debug!(
            "Search '{}' ({strategy}) returned {} results in {:.1}ms",
            analysis.normalized_query,
            results.len(),
            metrics.total_ms
        );

        Ok(SearchResponse {
            results,
            metrics,
            analysis,
        })
    }
}

/// Decides whether a dispatch can produce a response.
///
/// A response needs at least one signal that ran, or a timeout (which yields
/// an empty degraded response). Two backend failures are reported together.
fn check_dispatch(dispatch: Dispatch) -> Result<Dispatch> {
    let produced = dispatch.semantic.hits().is_some() || dispatch.graph.hits().is_some();
    if produced {
        return Ok(dispatch);
    }

    match (dispatch.semantic, dispatch.graph) {
        (SignalOutcome::Failed(semantic), SignalOutcome::Failed(graph)) => {
            Err(Error::BothBackendsUnavailable {
                semantic: semantic.to_string(),
                graph: graph.to_string(),
            })
        }
        (SignalOutcome::Failed(e), SignalOutcome::Skipped)
        | (SignalOutcome::Skipped, SignalOutcome::Failed(e)) => Err(e),
        (semantic, graph) => Ok(Dispatch {
            semantic,
            graph,
            semantic_time: dispatch.semantic_time,
            graph_time: dispatch.graph_time,
        }),
    }
}

impl std::fmt::Debug for HybridQueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridQueryEngine")
            .field("vector", &self.vector)
            .field("graph", &self.graph)
            .field("cache", &self.cache.backend_name())
            .field("weights", &self.weights)
            .field("concepts", &self.analyzer.vocabulary().len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
