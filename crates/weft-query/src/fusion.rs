//! Result fusion across the semantic and graph signals.
//!
//! Results are merged by id. The combined score is the weighted average of
//! the scores a result actually carries, with weights renormalized over the
//! signals present:
//!
//! ```text
//! combined = (w_s · s + w_g · g) / (w_s + w_g)   both signals
//! combined = s                                   semantic only
//! combined = g                                   graph only
//! ```
//!
//! so a result found by both signals always scores between its two signal
//! scores, and never below either weighted contribution.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use weft_core::{EngineConfig, Error, Result, SearchResult, Signal};

/// Validated per-signal fusion weights.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    semantic: f32,
    graph: f32,
}

impl FusionWeights {
    /// Creates weights; both must be finite and non-negative with a positive
    /// sum.
    pub fn new(semantic: f32, graph: f32) -> Result<Self> {
        if !semantic.is_finite() || !graph.is_finite() {
            return Err(Error::config("fusion weights must be finite"));
        }
        if semantic < 0.0 || graph < 0.0 {
            return Err(Error::config("fusion weights must be non-negative"));
        }
        if semantic + graph <= 0.0 {
            return Err(Error::config("fusion weights must not both be zero"));
        }
        Ok(Self { semantic, graph })
    }

    /// Weights from the engine configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(config.semantic_weight, config.graph_weight)
    }

    /// Semantic weight.
    pub fn semantic(&self) -> f32 {
        self.semantic
    }

    /// Graph weight.
    pub fn graph(&self) -> f32 {
        self.graph
    }

    /// Weight of `signal`.
    pub fn weight(&self, signal: Signal) -> f32 {
        match signal {
            Signal::Semantic => self.semantic,
            Signal::Graph => self.graph,
        }
    }

    /// Combined score for the given per-signal scores.
    ///
    /// Weights are renormalized over the scores present. If every present
    /// signal has weight zero (or none is present) the score is zero.
    pub fn combine(&self, semantic: Option<f32>, graph: Option<f32>) -> f32 {
        let mut numerator = 0.0_f32;
        let mut denominator = 0.0_f32;
        for (score, weight) in [(semantic, self.semantic), (graph, self.graph)] {
            if let Some(score) = score {
                let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
                numerator += weight * score;
                denominator += weight;
            }
        }
        if denominator <= 0.0 {
            return 0.0;
        }
        (numerator / denominator).clamp(0.0, 1.0)
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            semantic: 0.6,
            graph: 0.4,
        }
    }
}

/// Final ranking order: combined score descending, then number of signals
/// descending, then id ascending.
pub fn rank_order(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.combined_score
        .total_cmp(&a.combined_score)
        .then_with(|| b.found_via.len().cmp(&a.found_via.len()))
        .then_with(|| a.id.cmp(&b.id))
}

fn max_score(a: Option<f32>, b: Option<f32>) -> Option<f32> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Merge `incoming` into `existing` (same id), keeping each signal's best
/// score and filling empty display fields.
fn absorb(existing: &mut SearchResult, incoming: SearchResult) {
    existing.semantic_score = max_score(existing.semantic_score, incoming.semantic_score);
    existing.graph_score = max_score(existing.graph_score, incoming.graph_score);
    existing.found_via.extend(incoming.found_via);
    if existing.title.is_empty() {
        existing.title = incoming.title;
    }
    if existing.snippet.is_empty() {
        existing.snippet = incoming.snippet;
    }
    if existing.source_name.is_empty() {
        existing.source_name = incoming.source_name;
    }
    if existing.topics.is_empty() {
        existing.topics = incoming.topics;
    }
}

/// Merge several result sets, keeping each id's best score per signal.
///
/// The output carries the per-set maximum as its combined score and is in
/// [`rank_order`].
pub fn union_by_max<I>(sets: I) -> Vec<SearchResult>
where
    I: IntoIterator<Item = Vec<SearchResult>>,
{
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, SearchResult> = HashMap::new();

    for result in sets.into_iter().flatten() {
        match merged.get_mut(&result.id) {
            Some(existing) => absorb(existing, result),
            None => {
                order.push(result.id.clone());
                merged.insert(result.id.clone(), result);
            }
        }
    }

    let mut out: Vec<SearchResult> = order
        .into_iter()
        .filter_map(|id| merged.remove(&id))
        .map(|mut r| {
            r.combined_score = max_score(r.semantic_score, r.graph_score).unwrap_or(0.0);
            r
        })
        .collect();
    out.sort_by(rank_order);
    out
}

/// Fuses semantic and graph result lists into one ranking.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResultFusionEngine;

impl ResultFusionEngine {
    /// Merge `semantic` and `graph` by id, score with `weights`, and return
    /// the top `limit` in [`rank_order`].
    ///
    /// Semantic hits supply display fields first; graph hits fill what is
    /// missing. Duplicate ids within one list keep their best score.
    pub fn fuse(
        semantic: Vec<SearchResult>,
        graph: Vec<SearchResult>,
        weights: &FusionWeights,
        limit: usize,
    ) -> Vec<SearchResult> {
        let mut order: Vec<String> = Vec::new();
        let mut merged: HashMap<String, SearchResult> = HashMap::new();

        let tagged = semantic
            .into_iter()
            .map(|r| (Signal::Semantic, r))
            .chain(graph.into_iter().map(|r| (Signal::Graph, r)));

        for (signal, mut result) in tagged {
            // Each list only speaks for its own signal.
            match signal {
                Signal::Semantic => result.graph_score = None,
                Signal::Graph => result.semantic_score = None,
            }
            result.found_via.retain(|s| *s == signal);
            result.found_via.insert(signal);

            match merged.get_mut(&result.id) {
                Some(existing) => absorb(existing, result),
                None => {
                    order.push(result.id.clone());
                    merged.insert(result.id.clone(), result);
                }
            }
        }

        let mut fused: Vec<SearchResult> = order
            .into_iter()
            .filter_map(|id| merged.remove(&id))
            .map(|mut r| {
                r.combined_score = weights.combine(r.semantic_score, r.graph_score);
                r
            })
            .collect();

        fused.sort_by(rank_order);
        fused.truncate(limit);
        fused
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sem(id: &str, score: f32) -> SearchResult {
        SearchResult::semantic(id, id.to_uppercase(), score)
    }

    fn graph(id: &str, score: f32) -> SearchResult {
        SearchResult::graph(id, id.to_uppercase(), score)
    }

    // ------------------------------------------------------------------------
    // FusionWeights tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_weights_validation() {
        assert!(FusionWeights::new(0.6, 0.4).is_ok());
        assert!(FusionWeights::new(0.0, 1.0).is_ok());
        assert!(FusionWeights::new(-0.1, 1.0).is_err());
        assert!(FusionWeights::new(0.0, 0.0).is_err());
        assert!(FusionWeights::new(f32::NAN, 1.0).is_err());
        assert!(FusionWeights::new(f32::INFINITY, 1.0).is_err());
        assert_eq!(FusionWeights::default(), FusionWeights::new(0.6, 0.4).unwrap());
        assert_eq!(
            FusionWeights::from_config(&EngineConfig::default()).unwrap(),
            FusionWeights::default()
        );
    }

    #[test]
    fn test_combine_renormalizes_over_present_signals() {
        let w = FusionWeights::default();
        assert!((w.combine(Some(0.8), Some(0.5)) - 0.68).abs() < 1e-6);
        assert!((w.combine(None, Some(0.5)) - 0.5).abs() < 1e-6);
        assert!((w.combine(Some(0.8), None) - 0.8).abs() < 1e-6);
        assert_eq!(w.combine(None, None), 0.0);
    }

    #[test]
    fn test_combine_zero_weight_signal() {
        let w = FusionWeights::new(1.0, 0.0).unwrap();
        assert_eq!(w.combine(None, Some(0.9)), 0.0);
        assert!((w.combine(Some(0.3), Some(0.9)) - 0.3).abs() < 1e-6);
        assert_eq!(w.weight(Signal::Graph), 0.0);
    }

    // ------------------------------------------------------------------------
    // fuse tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_fuse_merges_by_id() {
        let fused = ResultFusionEngine::fuse(
            vec![sem("c1", 0.8).with_snippet("semantic snippet"), sem("c2", 0.9)],
            vec![graph("c1", 0.5).with_source_name("Docs"), graph("t1", 1.0)],
            &FusionWeights::default(),
            10,
        );

        let c1 = fused.iter().find(|r| r.id == "c1").unwrap();
        assert_eq!(c1.found_via.len(), 2);
        assert_eq!(c1.semantic_score, Some(0.8));
        assert_eq!(c1.graph_score, Some(0.5));
        assert_eq!(c1.snippet, "semantic snippet");
        assert_eq!(c1.source_name, "Docs");
        assert!((c1.combined_score - 0.68).abs() < 1e-6);

        let ids: Vec<_> = fused.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "c2", "c1"]);
    }

    #[test]
    fn test_fuse_tie_prefers_multi_signal_then_id() {
        let fused = ResultFusionEngine::fuse(
            vec![sem("b", 0.5), sem("multi", 0.5), sem("a", 0.5)],
            vec![graph("multi", 0.5)],
            &FusionWeights::default(),
            10,
        );
        let ids: Vec<_> = fused.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["multi", "a", "b"]);
    }

    #[test]
    fn test_fuse_limit_and_empty() {
        let fused = ResultFusionEngine::fuse(
            vec![sem("a", 0.9), sem("b", 0.8), sem("c", 0.7)],
            Vec::new(),
            &FusionWeights::default(),
            2,
        );
        assert_eq!(fused.len(), 2);
        assert!(
            ResultFusionEngine::fuse(Vec::new(), Vec::new(), &FusionWeights::default(), 5)
                .is_empty()
        );
    }

    #[test]
    fn test_fuse_duplicate_within_signal_keeps_max() {
        let fused = ResultFusionEngine::fuse(
            vec![sem("a", 0.3), sem("a", 0.7)],
            Vec::new(),
            &FusionWeights::default(),
            5,
        );
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].semantic_score, Some(0.7));
    }

    // ------------------------------------------------------------------------
    // union_by_max tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_union_by_max() {
        let merged = union_by_max(vec![
            vec![sem("a", 0.4), sem("b", 0.9)],
            vec![sem("a", 0.6)],
            Vec::new(),
        ]);
        let ids: Vec<_> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(merged[1].semantic_score, Some(0.6));
        assert!((merged[1].combined_score - 0.6).abs() < 1e-6);
    }

    // ------------------------------------------------------------------------
    // Property tests
    // ------------------------------------------------------------------------

    fn hits() -> impl Strategy<Value = Vec<(u8, f32)>> {
        prop::collection::vec((0u8..12, 0.0f32..=1.0), 0..12)
    }

    proptest! {
        #[test]
        fn prop_scores_bounded_and_sorted(
            s in hits(),
            g in hits(),
            ws in 0.0f32..=1.0,
            wg in 0.01f32..=1.0,
            limit in 0usize..20,
        ) {
            let weights = FusionWeights::new(ws, wg).unwrap();
            let semantic = s.iter().map(|(id, sc)| sem(&format!("r{id}"), *sc)).collect();
            let graph_hits = g.iter().map(|(id, sc)| graph(&format!("r{id}"), *sc)).collect();

            let fused = ResultFusionEngine::fuse(semantic, graph_hits, &weights, limit);

            prop_assert!(fused.len() <= limit);
            for r in &fused {
                prop_assert!((0.0..=1.0).contains(&r.combined_score));
            }
            for pair in fused.windows(2) {
                prop_assert!(pair[0].combined_score >= pair[1].combined_score);
            }
        }

        #[test]
        fn prop_both_signal_score_dominates_contributions(
            s in 0.0f32..=1.0,
            g in 0.0f32..=1.0,
            ws in 0.01f32..=1.0,
            wg in 0.01f32..=1.0,
        ) {
            let weights = FusionWeights::new(ws, wg).unwrap();
            let fused = ResultFusionEngine::fuse(
                vec![sem("x", s)],
                vec![graph("x", g)],
                &weights,
                1,
            );
            let r = &fused[0];
            let total = ws + wg;
            prop_assert_eq!(r.found_via.len(), 2);
            prop_assert!(r.combined_score + 1e-6 >= ws * s / total);
            prop_assert!(r.combined_score + 1e-6 >= wg * g / total);
            prop_assert!(r.combined_score + 1e-6 >= s.min(g));
            prop_assert!(r.combined_score <= s.max(g) + 1e-6);
        }

        #[test]
        fn prop_fusion_is_deterministic(
            s in hits(),
            g in hits(),
        ) {
            let build = || {
                ResultFusionEngine::fuse(
                    s.iter().map(|(id, sc)| sem(&format!("r{id}"), *sc)).collect(),
                    g.iter().map(|(id, sc)| graph(&format!("r{id}"), *sc)).collect(),
                    &FusionWeights::default(),
                    50,
                )
            };
            prop_assert_eq!(build(), build());
        }
    }
}
