//! Per-request metrics, request phases, and engine-wide statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use weft_core::Strategy;

// ============================================================================
// RequestPhase
// ============================================================================

/// Phase of a search request.
///
/// ```text
/// Analyzing → CacheLookup ─hit──────────────────────────────▶ Done
///                         └miss─▶ Dispatching → Fusing → CacheWrite → Done
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase {
    /// Normalizing and classifying the query.
    Analyzing,
    /// Checking the result cache.
    CacheLookup,
    /// Running the strategy against the backends.
    Dispatching,
    /// Merging signal results.
    Fusing,
    /// Writing fused results to the cache.
    CacheWrite,
    /// Finished.
    Done,
}

impl RequestPhase {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_advance_to(self, next: RequestPhase) -> bool {
        use RequestPhase::*;
        matches!(
            (self, next),
            (Analyzing, CacheLookup)
                | (CacheLookup, Done)
                | (CacheLookup, Dispatching)
                | (Dispatching, Fusing)
                | (Fusing, CacheWrite)
                | (Fusing, Done)
                | (CacheWrite, Done)
        )
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestPhase::Analyzing => "analyzing",
            RequestPhase::CacheLookup => "cache_lookup",
            RequestPhase::Dispatching => "dispatching",
            RequestPhase::Fusing => "fusing",
            RequestPhase::CacheWrite => "cache_write",
            RequestPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Tracks the current phase and how long each one took.
#[derive(Debug)]
pub struct PhaseTracker {
    phase: RequestPhase,
    entered_at: Instant,
    started_at: Instant,
    timings: Vec<(RequestPhase, Duration)>,
}

impl PhaseTracker {
    /// Starts in [`RequestPhase::Analyzing`].
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            phase: RequestPhase::Analyzing,
            entered_at: now,
            started_at: now,
            timings: Vec::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    /// Moves to `next`, recording the time spent in the current phase.
    pub fn advance(&mut self, next: RequestPhase) {
        if !self.phase.can_advance_to(next) {
            log::warn!("Unexpected request phase transition {} -> {next}", self.phase);
        }
        let now = Instant::now();
        self.timings.push((self.phase, now - self.entered_at));
        log::trace!("Request phase {} -> {next}", self.phase);
        self.phase = next;
        self.entered_at = now;
    }

    /// Total time spent in `phase` so far.
    pub fn time_in(&self, phase: RequestPhase) -> Duration {
        self.timings
            .iter()
            .filter(|(p, _)| *p == phase)
            .map(|(_, d)| *d)
            .sum()
    }

    /// Time since the tracker started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Milliseconds as a float, for metrics.
pub fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

// ============================================================================
// SearchMetrics
// ============================================================================

/// What happened to one signal during a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    /// The signal produced results (possibly none).
    Ok,
    /// Some sub-searches failed; the results come from the rest.
    Partial,
    /// The strategy did not use the signal.
    Skipped,
    /// The backend failed after retry.
    Failed,
    /// The request deadline elapsed first.
    TimedOut,
}

/// Timing and outcome of one search request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchMetrics {
    /// Wall time for the whole request.
    pub total_ms: f64,
    /// Time spent analyzing the query.
    pub analysis_ms: f64,
    /// Time spent on cache lookup and write.
    pub cache_ms: f64,
    /// Time spent in the semantic signal.
    pub semantic_ms: f64,
    /// Time spent in the graph signal.
    pub graph_ms: f64,
    /// Time spent fusing.
    pub fusion_ms: f64,
    /// Whether results came from the cache.
    pub cache_hit: bool,
    /// Whether a signal failed or timed out and results are partial.
    pub degraded: bool,
    /// Strategy that produced the results.
    pub strategy: Strategy,
    /// Semantic signal outcome.
    pub semantic_status: SignalStatus,
    /// Graph signal outcome.
    pub graph_status: SignalStatus,
}

// ============================================================================
// EngineStats
// ============================================================================

/// Engine-wide request counters.
#[derive(Debug, Default)]
pub struct EngineStats {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    degraded: AtomicU64,
    failures: AtomicU64,
    over_budget: AtomicU64,
    total_latency_us: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStatsSnapshot {
    /// Requests handled, successful or not.
    pub requests: u64,
    /// Requests served from the cache.
    pub cache_hits: u64,
    /// Requests answered with partial results.
    pub degraded: u64,
    /// Requests that returned an error.
    pub failures: u64,
    /// Requests slower than the latency budget.
    pub over_budget: u64,
    /// Mean request latency.
    pub mean_latency_ms: f64,
}

impl EngineStats {
    /// Records one completed request.
    pub fn record(&self, metrics: &SearchMetrics, over_budget: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if metrics.cache_hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        if metrics.degraded {
            self.degraded.fetch_add(1, Ordering::Relaxed);
        }
        if over_budget {
            self.over_budget.fetch_add(1, Ordering::Relaxed);
        }
        self.add_latency(metrics.total_ms);
    }

    /// Records one failed request.
    pub fn record_failure(&self, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.add_latency(millis(elapsed));
    }

    fn add_latency(&self, ms: f64) {
        let us = (ms * 1000.0).max(0.0) as u64;
        self.total_latency_us.fetch_add(us, Ordering::Relaxed);
    }

    /// Snapshot of the counters.
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let total_us = self.total_latency_us.load(Ordering::Relaxed);
        EngineStatsSnapshot {
            requests,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            over_budget: self.over_budget.load(Ordering::Relaxed),
            mean_latency_ms: if requests == 0 {
                0.0
            } else {
                total_us as f64 / requests as f64 / 1000.0
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
