//! Query command handlers.
//!
//! Each handler returns the text it would print so the formatting can be
//! tested without capturing stdout.

use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;

use weft_cache::CacheBackend;
use weft_core::{EngineConfig, Result, Strategy};
use weft_query::{HybridQueryEngine, SearchOptions, SearchResponse};

use crate::corpus::Corpus;

/// Search flags from the command line.
#[derive(Clone, Debug, Default)]
pub struct SearchArgs {
    /// Strategy name; the analyzer decides when absent.
    pub strategy: Option<String>,
    /// Result limit.
    pub limit: Option<usize>,
    /// Minimum chunk quality.
    pub quality_threshold: Option<f32>,
    /// Emit JSON instead of a table.
    pub json: bool,
    /// Number of times to run the query.
    pub repeat: usize,
}

impl SearchArgs {
    fn options(&self) -> Result<SearchOptions> {
        let mut options = SearchOptions::new();
        if let Some(name) = &self.strategy {
            options = options.with_strategy(name.parse::<Strategy>()?);
        }
        if let Some(limit) = self.limit {
            options = options.with_limit(limit);
        }
        if let Some(threshold) = self.quality_threshold {
            options = options.with_quality_threshold(threshold);
        }
        Ok(options)
    }
}

/// Builds an engine over a corpus file.
pub async fn build_engine(
    config: EngineConfig,
    corpus_path: &Path,
    cache: Option<Arc<dyn CacheBackend>>,
) -> Result<HybridQueryEngine> {
    let corpus = Corpus::load(corpus_path)?;
    let mut builder = HybridQueryEngine::builder()
        .config(config)
        .vector_store(Arc::new(corpus.vector))
        .graph_store(Arc::new(weft_graph::InMemoryGraphStore::new(corpus.graph)));
    if let Some(cache) = cache {
        builder = builder.cache_backend(cache);
    }
    builder.build().await
}

/// Runs a search `args.repeat` times and renders every response.
pub async fn cmd_search(engine: &HybridQueryEngine, query: &str, args: &SearchArgs) -> Result<String> {
    let options = args.options()?;
    let mut out = String::new();

    for run in 0..args.repeat.max(1) {
        let response = engine.search(query, options.clone()).await?;
        if args.json {
            out.push_str(&serde_json::to_string_pretty(&response)?);
            out.push('\n');
        } else {
            if args.repeat > 1 {
                let _ = writeln!(out, "# run {}", run + 1);
            }
            out.push_str(&format_response(&response));
        }
    }

    if args.repeat > 1 && !args.json {
        let stats = engine.stats();
        let cache = engine.cache_stats();
        let _ = writeln!(
            out,
            "requests: {}  cache hits: {}  degraded: {}  mean latency: {:.2}ms  cache hit rate: {:.0}%",
            stats.requests,
            stats.cache_hits,
            stats.degraded,
            stats.mean_latency_ms,
            cache.hit_rate() * 100.0
        );
    }
    Ok(out)
}

/// Renders ranked results followed by a one-line metrics summary.
pub fn format_response(response: &SearchResponse) -> String {
    let mut out = String::new();

    if response.results.is_empty() {
        out.push_str("No results.\n");
    }
    for (rank, result) in response.results.iter().enumerate() {
        let via: Vec<String> = result.found_via.iter().map(ToString::to_string).collect();
        let _ = writeln!(
            out,
            "{:>2}. {:.3}  {}  [{}]",
            rank + 1,
            result.combined_score,
            result.title,
            via.join("+")
        );
        if !result.snippet.is_empty() {
            let _ = writeln!(out, "      {}", result.snippet);
        }
        if !result.source_name.is_empty() {
            let _ = writeln!(out, "      source: {}  id: {}", result.source_name, result.id);
        }
    }

    let metrics = &response.metrics;
    let _ = writeln!(
        out,
        "strategy: {}  total: {:.2}ms  semantic: {:?}  graph: {:?}  cache hit: {}  degraded: {}",
        metrics.strategy,
        metrics.total_ms,
        metrics.semantic_status,
        metrics.graph_status,
        metrics.cache_hit,
        metrics.degraded
    );
    out
}

/// Lists vocabulary concepts matching a partial query.
pub fn cmd_suggest(engine: &HybridQueryEngine, partial: &str) -> String {
    let suggestions = engine.suggest(partial);
    if suggestions.is_empty() {
        return "No suggestions.\n".to_string();
    }
    suggestions.into_iter().map(|s| s + "\n").collect()
}

/// Renders the query analysis as JSON.
pub async fn cmd_analyze(engine: &HybridQueryEngine, query: &str) -> Result<String> {
    let analysis = engine.analyze(query).await?;
    Ok(format!("{}\n", serde_json::to_string_pretty(&analysis)?))
}

// ============================================================================
// Tests
// ============================================================================
