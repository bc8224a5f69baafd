//! Partial failure, deadlines, cancellation, and cache isolation.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use weft_cache::{BreakerState, CacheBackend, CacheEntry, InMemoryCacheBackend};
use weft_core::{CancellationToken, Error, Result, Signal, Strategy};
use weft_query::{SearchOptions, SignalStatus};

use common::{
    CountingCache, FailingGraphStore, FailingVectorStore, HangingCache, HangingGraphStore,
    HangingVectorStore, TermFailingVectorStore,
};

fn hybrid() -> SearchOptions {
    SearchOptions::new().with_strategy(Strategy::HybridBalanced)
}

#[tokio::test(start_paused = true)]
async fn test_vector_failure_degrades_to_graph() {
    let cache = Arc::new(CountingCache::default());
    let vector = Arc::new(FailingVectorStore::default());
    let engine =
        common::engine_with(vector.clone(), common::graph_store(), cache.clone(), common::config())
            .await;

    let response = engine.search("FastAPI authentication", hybrid()).await.unwrap();

    assert!(response.metrics.degraded);
    assert_eq!(response.metrics.semantic_status, SignalStatus::Failed);
    assert_eq!(response.metrics.graph_status, SignalStatus::Ok);
    assert!(!response.results.is_empty());
    assert!(response.results.iter().all(|r| r.found_via.contains(&Signal::Graph)));
    assert!(response.results.iter().all(|r| r.semantic_score.is_none()));
    // Retried once at the adapter.
    assert_eq!(vector.calls.load(Ordering::SeqCst), 2);

    // Degraded responses are not cached.
    assert_eq!(cache.result_writes(), 0);
    let again = engine.search("FastAPI authentication", hybrid()).await.unwrap();
    assert!(!again.metrics.cache_hit);

    let stats = engine.stats();
    assert_eq!(stats.degraded, 2);
    assert_eq!(stats.failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_both_backends_failing_is_an_error() {
    let cache = Arc::new(CountingCache::default());
    let engine = common::engine_with(
        Arc::new(FailingVectorStore::default()),
        Arc::new(FailingGraphStore::default()),
        cache.clone(),
        common::config(),
    )
    .await;

    let err = engine.search("FastAPI authentication", hybrid()).await.unwrap_err();

    assert!(matches!(err, Error::BothBackendsUnavailable { .. }), "{err}");
    assert_eq!(cache.result_writes(), 0);
    assert_eq!(engine.stats().failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_semantic_only_falls_back_to_graph() {
    let engine = common::engine_with(
        Arc::new(FailingVectorStore::default()),
        common::graph_store(),
        Arc::new(InMemoryCacheBackend::new()),
        common::config(),
    )
    .await;

    let response = engine
        .search(
            "FastAPI authentication",
            SearchOptions::new().with_strategy(Strategy::SemanticOnly),
        )
        .await
        .unwrap();

    assert_eq!(response.metrics.strategy, Strategy::SemanticOnly);
    assert!(response.metrics.degraded);
    assert_eq!(response.metrics.semantic_status, SignalStatus::Failed);
    assert_eq!(response.metrics.graph_status, SignalStatus::Ok);
    assert!(!response.results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_graph_only_falls_back_to_semantic() {
    let graph = Arc::new(FailingGraphStore::default());
    let engine = common::engine_with(
        common::vector_store(),
        graph.clone(),
        Arc::new(InMemoryCacheBackend::new()),
        common::config(),
    )
    .await;

    let response = engine
        .search(
            "FastAPI authentication",
            SearchOptions::new().with_strategy(Strategy::GraphOnly),
        )
        .await
        .unwrap();

    assert!(response.metrics.degraded);
    assert_eq!(response.metrics.graph_status, SignalStatus::Failed);
    assert_eq!(response.metrics.semantic_status, SignalStatus::Ok);
    assert_eq!(response.results[0].id, common::OAUTH2_CHUNK);
    assert!(graph.calls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_concept_expansion_survives_graph_failure() {
    let engine = common::engine_with(
        common::vector_store(),
        Arc::new(FailingGraphStore::default()),
        Arc::new(InMemoryCacheBackend::new()),
        common::config(),
    )
    .await;

    let response = engine
        .search(
            "FastAPI authentication",
            SearchOptions::new().with_strategy(Strategy::ConceptExpansion),
        )
        .await
        .unwrap();

    assert!(response.metrics.degraded);
    assert_eq!(response.metrics.semantic_status, SignalStatus::Ok);
    assert!(response.results.iter().any(|r| r.id == common::OAUTH2_CHUNK));
}

#[tokio::test(start_paused = true)]
async fn test_concept_expansion_with_one_failed_term_is_degraded() {
    let cache = Arc::new(CountingCache::default());
    let vector = Arc::new(TermFailingVectorStore::new("Authentication"));
    let engine =
        common::engine_with(vector.clone(), common::graph_store(), cache.clone(), common::config())
            .await;
    let expansion = || SearchOptions::new().with_strategy(Strategy::ConceptExpansion);

    let response = engine.search("FastAPI authentication", expansion()).await.unwrap();

    assert!(vector.failures.load(Ordering::SeqCst) >= 1);
    assert!(response.metrics.degraded);
    assert_eq!(response.metrics.semantic_status, SignalStatus::Partial);
    assert_eq!(response.metrics.graph_status, SignalStatus::Ok);
    assert!(response.results.iter().any(|r| r.semantic_score.is_some()));

    // Results missing a term are not cached.
    assert_eq!(cache.result_writes(), 0);
    let again = engine.search("FastAPI authentication", expansion()).await.unwrap();
    assert!(!again.metrics.cache_hit);
    assert_eq!(engine.stats().degraded, 2);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_returns_partial_results() {
    let mut config = common::config();
    config.request_deadline_ms = 200;
    let engine = common::engine_with(
        Arc::new(HangingVectorStore),
        common::graph_store(),
        Arc::new(InMemoryCacheBackend::new()),
        config,
    )
    .await;

    let response = engine.search("FastAPI authentication", hybrid()).await.unwrap();

    assert!(response.metrics.degraded);
    assert_eq!(response.metrics.semantic_status, SignalStatus::TimedOut);
    assert_eq!(response.metrics.graph_status, SignalStatus::Ok);
    assert!(!response.results.is_empty());
    assert!(response.metrics.semantic_ms >= 199.0);
    assert!(response.metrics.total_ms >= 199.0);

    // Over the 100ms budget.
    assert_eq!(engine.stats().over_budget, 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_with_no_signal_is_empty_and_degraded() {
    let mut config = common::config();
    config.request_deadline_ms = 100;
    let engine = common::engine_with(
        Arc::new(HangingVectorStore),
        Arc::new(HangingGraphStore),
        Arc::new(InMemoryCacheBackend::new()),
        config,
    )
    .await;

    let response = engine.search("FastAPI authentication", hybrid()).await.unwrap();

    assert!(response.results.is_empty());
    assert!(response.metrics.degraded);
    assert_eq!(response.metrics.semantic_status, SignalStatus::TimedOut);
    assert_eq!(response.metrics.graph_status, SignalStatus::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_caller_cancellation_aborts_request() {
    let engine = common::engine_with(
        Arc::new(HangingVectorStore),
        Arc::new(HangingGraphStore),
        Arc::new(InMemoryCacheBackend::new()),
        common::config(),
    )
    .await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let err = engine
        .search("FastAPI authentication", hybrid().with_cancellation(token))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(engine.stats().failures, 1);
}

#[tokio::test]
async fn test_already_cancelled_request_fails_fast() {
    let engine = common::engine().await;
    let token = CancellationToken::new();
    token.cancel();

    let err = engine
        .search("FastAPI authentication", hybrid().with_cancellation(token))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_cancelled_request_ignores_warm_cache() {
    let engine = common::engine().await;
    let warm = engine.search("FastAPI authentication", hybrid()).await.unwrap();
    assert!(!warm.results.is_empty());

    let token = CancellationToken::new();
    token.cancel();
    let err = engine
        .search("FastAPI authentication", hybrid().with_cancellation(token))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(engine.stats().cache_hits, 0);
}

#[tokio::test(start_paused = true)]
async fn test_analysis_is_cached_only_after_success() {
    let cache = Arc::new(CountingCache::default());
    let engine = common::engine_with(
        Arc::new(FailingVectorStore::default()),
        Arc::new(FailingGraphStore::default()),
        cache.clone(),
        common::config(),
    )
    .await;

    let err = engine.search("FastAPI authentication", hybrid()).await.unwrap_err();
    assert!(matches!(err, Error::BothBackendsUnavailable { .. }));
    assert_eq!(cache.analysis_writes(), 0);

    let cache = Arc::new(CountingCache::default());
    let engine = common::engine_with(
        common::vector_store(),
        common::graph_store(),
        cache.clone(),
        common::config(),
    )
    .await;
    engine.search("FastAPI authentication", hybrid()).await.unwrap();
    assert_eq!(cache.analysis_writes(), 1);
    assert_eq!(cache.result_writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_cache_is_cut_off_then_bypassed() {
    let mut config = common::config();
    config.cache_timeout_ms = 50;
    config.circuit_breaker_threshold = 2;
    let engine = common::engine_with(
        common::vector_store(),
        common::graph_store(),
        Arc::new(HangingCache),
        config,
    )
    .await;

    // Analysis and result reads each time out once; the breaker opens.
    let first = engine.search("FastAPI authentication", hybrid()).await.unwrap();
    assert!(!first.metrics.cache_hit);
    assert!(!first.metrics.degraded);
    assert!(!first.results.is_empty());
    assert!(first.metrics.total_ms >= 99.0 && first.metrics.total_ms < 200.0);

    let stats = engine.cache_stats();
    assert_eq!(stats.errors, 2);
    assert_eq!(stats.breaker_state, BreakerState::Open);

    let second = engine.search("FastAPI authentication", hybrid()).await.unwrap();
    assert!(!second.results.is_empty());
    assert!(second.metrics.total_ms < 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_cache_cannot_outlast_the_deadline() {
    let mut config = common::config();
    config.request_deadline_ms = 200;
    config.cache_timeout_ms = 60_000;
    let engine = common::engine_with(
        common::vector_store(),
        common::graph_store(),
        Arc::new(HangingCache),
        config,
    )
    .await;

    let response = engine.search("FastAPI authentication", hybrid()).await.unwrap();

    assert!(!response.metrics.cache_hit);
    assert!(response.metrics.degraded);
    assert!(response.metrics.total_ms >= 199.0 && response.metrics.total_ms < 300.0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_cache_honours_cancellation() {
    let mut config = common::config();
    config.cache_timeout_ms = 60_000;
    let engine = common::engine_with(
        common::vector_store(),
        common::graph_store(),
        Arc::new(HangingCache),
        config,
    )
    .await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = engine
        .search("FastAPI authentication", hybrid().with_cancellation(token))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_millis(100));
}

/// Cache backend that always fails.
struct BrokenCache;

#[async_trait]
impl CacheBackend for BrokenCache {
    async fn get(&self, _namespace: &str, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(Error::cache("connection refused"))
    }

    async fn set(&self, _entry: CacheEntry) -> Result<()> {
        Err(Error::cache("connection refused"))
    }

    async fn delete(&self, _namespace: &str, _key: &str) -> Result<()> {
        Err(Error::cache("connection refused"))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

#[tokio::test]
async fn test_cache_failure_never_fails_search() {
    let mut config = common::config();
    config.circuit_breaker_threshold = 2;
    let engine = common::engine_with(
        common::vector_store(),
        common::graph_store(),
        Arc::new(BrokenCache),
        config,
    )
    .await;

    for _ in 0..3 {
        let response = engine.search("FastAPI authentication", hybrid()).await.unwrap();
        assert!(!response.metrics.cache_hit);
        assert!(!response.metrics.degraded);
        assert!(!response.results.is_empty());
    }

    let stats = engine.cache_stats();
    assert_eq!(stats.breaker_state, BreakerState::Open);
    assert_eq!(stats.errors, 2);
    assert!(stats.bypassed > 0);
}
