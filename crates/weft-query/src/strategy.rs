//! Strategy table: one static executor per [`Strategy`].
//!
//! An executor decides which signals run, in what order, and with which
//! seeds. It never fuses; it hands both signal outcomes back to the engine
//! as a [`Dispatch`].
//!
//! | Strategy | Semantic | Graph |
//! |----------|----------|-------|
//! | `SEMANTIC_ONLY` | query embedding | fallback only |
//! | `GRAPH_ONLY` | fallback only | concepts |
//! | `HYBRID_BALANCED` | query embedding | concepts, concurrently |
//! | `SEMANTIC_THEN_GRAPH` | query embedding | concepts + topics of top hits |
//! | `GRAPH_THEN_SEMANTIC` | query + titles of top graph hits | concepts |
//! | `CONCEPT_EXPANSION` | every expanded term | every expanded term |

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::Instant;
use weft_core::{Error, RequestContext, Result, SearchResult, Strategy};
use weft_graph::GraphSearchAdapter;
use weft_vector::VectorSearchAdapter;

use crate::analyzer::QueryAnalysis;
use crate::fusion::union_by_max;
use crate::metrics::SignalStatus;

// ============================================================================
// Outcomes
// ============================================================================

/// What one signal produced.
#[derive(Debug)]
pub enum SignalOutcome {
    /// The signal ran and returned these hits (possibly none).
    Hits(Vec<SearchResult>),
    /// Some sub-searches of the signal failed; these hits come from the rest.
    Partial(Vec<SearchResult>),
    /// The strategy did not run this signal.
    Skipped,
    /// The backend failed after retry.
    Failed(Error),
    /// The request deadline elapsed while the signal was running.
    TimedOut,
}

impl SignalOutcome {
    /// Classifies an adapter result.
    pub fn from_result(result: Result<Vec<SearchResult>>) -> Self {
        match result {
            Ok(hits) => SignalOutcome::Hits(hits),
            Err(Error::DeadlineExceeded { .. }) => SignalOutcome::TimedOut,
            Err(e) => SignalOutcome::Failed(e),
        }
    }

    /// Hits, if the signal succeeded.
    pub fn hits(&self) -> Option<&[SearchResult]> {
        match self {
            SignalOutcome::Hits(hits) | SignalOutcome::Partial(hits) => Some(hits),
            _ => None,
        }
    }

    /// Whether the signal failed, timed out, or lost some of its sub-searches.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SignalOutcome::Failed(_) | SignalOutcome::TimedOut | SignalOutcome::Partial(_)
        )
    }

    /// Status reported in the request metrics.
    pub fn status(&self) -> SignalStatus {
        match self {
            SignalOutcome::Hits(_) => SignalStatus::Ok,
            SignalOutcome::Partial(_) => SignalStatus::Partial,
            SignalOutcome::Skipped => SignalStatus::Skipped,
            SignalOutcome::Failed(_) => SignalStatus::Failed,
            SignalOutcome::TimedOut => SignalStatus::TimedOut,
        }
    }

    /// Consumes the outcome, yielding its hits or nothing.
    pub fn into_hits(self) -> Vec<SearchResult> {
        match self {
            SignalOutcome::Hits(hits) | SignalOutcome::Partial(hits) => hits,
            _ => Vec::new(),
        }
    }

    /// Human-readable failure description, for error reports.
    pub fn describe(&self) -> String {
        match self {
            SignalOutcome::Hits(hits) => format!("{} hits", hits.len()),
            SignalOutcome::Partial(hits) => format!("{} hits, some terms failed", hits.len()),
            SignalOutcome::Skipped => "skipped".to_string(),
            SignalOutcome::Failed(e) => e.to_string(),
            SignalOutcome::TimedOut => "timed out".to_string(),
        }
    }
}

/// Both signal outcomes of one strategy run, with their timings.
#[derive(Debug)]
pub struct Dispatch {
    /// Semantic signal outcome.
    pub semantic: SignalOutcome,
    /// Graph signal outcome.
    pub graph: SignalOutcome,
    /// Time spent in the semantic signal.
    pub semantic_time: Duration,
    /// Time spent in the graph signal.
    pub graph_time: Duration,
}

impl Dispatch {
    fn new(semantic: Timed, graph: Timed) -> Self {
        Self {
            semantic: semantic.0,
            graph: graph.0,
            semantic_time: semantic.1,
            graph_time: graph.1,
        }
    }

    /// Whether either signal failed or timed out.
    pub fn is_degraded(&self) -> bool {
        self.semantic.is_failure() || self.graph.is_failure()
    }
}

type Timed = (SignalOutcome, Duration);

fn skipped() -> Timed {
    (SignalOutcome::Skipped, Duration::ZERO)
}

async fn timed<F>(fut: F) -> Timed
where
    F: Future<Output = Result<Vec<SearchResult>>>,
{
    let started = Instant::now();
    let outcome = SignalOutcome::from_result(fut.await);
    (outcome, started.elapsed())
}

// ============================================================================
// Execution context
// ============================================================================

/// Everything an executor needs for one request.
pub struct ExecutionContext<'a> {
    /// Request deadline and cancellation.
    pub request: &'a RequestContext,
    /// Analysis of the query.
    pub analysis: &'a QueryAnalysis,
    /// Candidates fetched per signal.
    pub limit: usize,
    /// Minimum chunk quality for the semantic signal.
    pub quality_threshold: f32,
    /// Graph traversal depth.
    pub max_depth: usize,
    /// First-stage results used to seed the second stage.
    pub seed_top_k: usize,
    /// Cap on terms after concept expansion.
    pub max_expansion_terms: usize,
    /// Semantic signal.
    pub vector: &'a VectorSearchAdapter,
    /// Graph signal.
    pub graph: &'a GraphSearchAdapter,
}

impl ExecutionContext<'_> {
    /// Normalized query text.
    pub fn query(&self) -> &str {
        &self.analysis.normalized_query
    }

    /// Graph seeds: the detected concepts, or the whole query when none were
    /// detected (so the fuzzy matcher gets a chance).
    pub fn graph_seeds(&self) -> Vec<String> {
        if self.analysis.detected_concepts.is_empty() {
            vec![self.query().to_string()]
        } else {
            self.analysis.detected_concepts.clone()
        }
    }

    /// Embeds `text` and runs a semantic search with it.
    pub async fn semantic(&self, text: &str) -> Result<Vec<SearchResult>> {
        let embedding = self.vector.embed(self.request, text).await?;
        self.vector
            .semantic_search(self.request, &embedding, self.limit, self.quality_threshold)
            .await
    }

    /// Runs a graph search from `seeds`.
    pub async fn graph(&self, seeds: &[String]) -> Result<Vec<SearchResult>> {
        self.graph
            .graph_search(self.request, seeds, self.max_depth, self.limit)
            .await
    }

    /// Runs the semantic signal for the query, timed.
    async fn timed_semantic(&self, text: &str) -> Timed {
        timed(self.semantic(text)).await
    }

    /// Runs the graph signal, timed.
    async fn timed_graph(&self, seeds: &[String]) -> Timed {
        timed(self.graph(seeds)).await
    }
}

fn should_fall_back(outcome: &SignalOutcome) -> bool {
    matches!(outcome, SignalOutcome::Failed(e) if !e.is_interruption())
}

fn top_k(outcome: &SignalOutcome, k: usize) -> &[SearchResult] {
    let hits = outcome.hits().unwrap_or_default();
    &hits[..hits.len().min(k)]
}

// ============================================================================
// Executors
// ============================================================================

/// Runs one [`Strategy`] against the backends.
#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    /// The strategy this executor implements.
    fn strategy(&self) -> Strategy;

    /// Runs the strategy.
    async fn execute(&self, cx: &ExecutionContext<'_>) -> Dispatch;
}

/// Returns the executor for `strategy`.
pub fn executor_for(strategy: Strategy) -> &'static dyn StrategyExecutor {
    match strategy {
        Strategy::SemanticOnly => &SemanticOnly,
        Strategy::GraphOnly => &GraphOnly,
        Strategy::HybridBalanced => &HybridBalanced,
        Strategy::SemanticThenGraph => &SemanticThenGraph,
        Strategy::GraphThenSemantic => &GraphThenSemantic,
        Strategy::ConceptExpansion => &ConceptExpansion,
    }
}

/// Vector only; falls back to the graph when the vector backend fails.
#[derive(Debug)]
pub struct SemanticOnly;

#[async_trait]
impl StrategyExecutor for SemanticOnly {
    fn strategy(&self) -> Strategy {
        Strategy::SemanticOnly
    }

    async fn execute(&self, cx: &ExecutionContext<'_>) -> Dispatch {
        let semantic = cx.timed_semantic(cx.query()).await;
        let graph = if should_fall_back(&semantic.0) {
            log::warn!("Semantic signal failed; falling back to graph");
            cx.timed_graph(&cx.graph_seeds()).await
        } else {
            skipped()
        };
        Dispatch::new(semantic, graph)
    }
}

/// Graph only; falls back to the vector store when the graph backend fails.
#[derive(Debug)]
pub struct GraphOnly;

#[async_trait]
impl StrategyExecutor for GraphOnly {
    fn strategy(&self) -> Strategy {
        Strategy::GraphOnly
    }

    async fn execute(&self, cx: &ExecutionContext<'_>) -> Dispatch {
        let graph = cx.timed_graph(&cx.graph_seeds()).await;
        let semantic = if should_fall_back(&graph.0) {
            log::warn!("Graph signal failed; falling back to semantic");
            cx.timed_semantic(cx.query()).await
        } else {
            skipped()
        };
        Dispatch::new(semantic, graph)
    }
}

/// Both signals concurrently.
#[derive(Debug)]
pub struct HybridBalanced;

#[async_trait]
impl StrategyExecutor for HybridBalanced {
    fn strategy(&self) -> Strategy {
        Strategy::HybridBalanced
    }

    async fn execute(&self, cx: &ExecutionContext<'_>) -> Dispatch {
        let seeds = cx.graph_seeds();
        let (semantic, graph) = tokio::join!(cx.timed_semantic(cx.query()), cx.timed_graph(&seeds));
        Dispatch::new(semantic, graph)
    }
}

/// Vector first, then the graph seeded with the topics of the top hits.
#[derive(Debug)]
pub struct SemanticThenGraph;

#[async_trait]
impl StrategyExecutor for SemanticThenGraph {
    fn strategy(&self) -> Strategy {
        Strategy::SemanticThenGraph
    }

    async fn execute(&self, cx: &ExecutionContext<'_>) -> Dispatch {
        let semantic = cx.timed_semantic(cx.query()).await;

        let mut seeds = cx.analysis.detected_concepts.clone();
        for hit in top_k(&semantic.0, cx.seed_top_k) {
            for topic in &hit.topics {
                if !seeds.iter().any(|s| s.eq_ignore_ascii_case(topic)) {
                    seeds.push(topic.clone());
                }
            }
        }
        if seeds.is_empty() {
            seeds = cx.graph_seeds();
        }
        log::debug!("Seeding graph with {} terms from semantic stage", seeds.len());

        let graph = cx.timed_graph(&seeds).await;
        Dispatch::new(semantic, graph)
    }
}

/// Graph first, then a semantic search on the query enriched with the
/// titles of the top graph hits.
#[derive(Debug)]
pub struct GraphThenSemantic;

#[async_trait]
impl StrategyExecutor for GraphThenSemantic {
    fn strategy(&self) -> Strategy {
        Strategy::GraphThenSemantic
    }

    async fn execute(&self, cx: &ExecutionContext<'_>) -> Dispatch {
        let graph = cx.timed_graph(&cx.graph_seeds()).await;

        let mut text = cx.query().to_string();
        for hit in top_k(&graph.0, cx.seed_top_k) {
            text.push(' ');
            text.push_str(&hit.title);
        }
        log::debug!("Semantic stage query: '{text}'");

        let semantic = cx.timed_semantic(&text).await;
        Dispatch::new(semantic, graph)
    }
}

/// Concepts expanded along `RELATED_TO`; every term searched on both
/// signals, per-signal sets unioned by best score.
#[derive(Debug)]
pub struct ConceptExpansion;

impl ConceptExpansion {
    async fn expand(&self, cx: &ExecutionContext<'_>) -> Vec<String> {
        let concepts = &cx.analysis.detected_concepts;
        if concepts.is_empty() {
            return vec![cx.query().to_string()];
        }

        let budget = cx.max_expansion_terms.saturating_sub(concepts.len());
        let mut terms = concepts.clone();
        match cx.graph.related_terms(cx.request, concepts, budget).await {
            Ok(related) => {
                for term in related {
                    if !terms.iter().any(|t| t.eq_ignore_ascii_case(&term)) {
                        terms.push(term);
                    }
                }
            }
            Err(e) => log::warn!("Concept expansion failed, using detected concepts: {e}"),
        }
        terms.truncate(cx.max_expansion_terms.max(1));
        terms
    }
}

/// Folds per-term outcomes: hits from every successful term, or the first
/// failure if no term succeeded. A mix of both is [`SignalOutcome::Partial`].
fn union_outcomes(outcomes: Vec<SignalOutcome>) -> SignalOutcome {
    let mut sets = Vec::new();
    let mut failure = None;
    for outcome in outcomes {
        match outcome {
            SignalOutcome::Hits(hits) => sets.push(hits),
            SignalOutcome::Partial(hits) => {
                sets.push(hits);
                failure.get_or_insert(SignalOutcome::Partial(Vec::new()));
            }
            SignalOutcome::Skipped => {}
            other => {
                failure.get_or_insert(other);
            }
        }
    }
    match failure {
        Some(failure) if sets.is_empty() => failure,
        Some(_) => {
            log::warn!("Some expanded terms failed; using partial results");
            SignalOutcome::Partial(union_by_max(sets))
        }
        None => SignalOutcome::Hits(union_by_max(sets)),
    }
}

#[async_trait]
impl StrategyExecutor for ConceptExpansion {
    fn strategy(&self) -> Strategy {
        Strategy::ConceptExpansion
    }

    async fn execute(&self, cx: &ExecutionContext<'_>) -> Dispatch {
        let terms = self.expand(cx).await;
        log::debug!("Concept expansion searching {} terms", terms.len());

        let semantic = async {
            let started = Instant::now();
            let outcomes = join_all(terms.iter().map(|t| async move {
                SignalOutcome::from_result(cx.semantic(t).await)
            }))
            .await;
            (union_outcomes(outcomes), started.elapsed())
        };
        let graph = async {
            let started = Instant::now();
            let outcomes = join_all(terms.iter().map(|t| async move {
                SignalOutcome::from_result(cx.graph(std::slice::from_ref(t)).await)
            }))
            .await;
            (union_outcomes(outcomes), started.elapsed())
        };

        let (semantic, graph) = tokio::join!(semantic, graph);
        Dispatch::new(semantic, graph)
    }
}

// ============================================================================
// Tests
// ============================================================================
