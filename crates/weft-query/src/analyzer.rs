//! Query analysis: normalization, concept detection, complexity, and
//! strategy recommendation.
//!
//! # Complexity
//!
//! ```text
//! complexity = 0.4 · min(tokens / 10, 1)
//!            + 0.4 · min(concepts / 5, 1)
//!            + 0.2 · [query uses search operators]
//! ```
//!
//! # Strategy
//!
//! 1. two or more concepts and complexity above the threshold →
//!    `CONCEPT_EXPANSION`
//! 2. every token belongs to a known entity name → `GRAPH_ONLY`
//! 3. otherwise → `HYBRID_BALANCED`

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use weft_core::{EngineConfig, Error, Result, Strategy, normalize_query, tokenize};

use crate::vocabulary::ConceptVocabulary;

/// Default complexity threshold for concept expansion.
pub const DEFAULT_COMPLEXITY_THRESHOLD: f32 = 0.5;

/// Default number of autocomplete suggestions.
pub const DEFAULT_SUGGEST_LIMIT: usize = 10;

/// Boolean operator keywords, recognized only in upper case.
const OPERATOR_WORDS: [&str; 3] = ["AND", "OR", "NOT"];

/// Operator characters recognized anywhere in the query.
const OPERATOR_CHARS: [char; 6] = ['"', '(', ')', '|', '&', '+'];

/// Result of analyzing one query. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    /// Lowercased, trimmed, whitespace-collapsed query.
    pub normalized_query: String,
    /// Known concepts, in order of first appearance.
    pub detected_concepts: Vec<String>,
    /// Complexity in `[0, 1]`.
    pub complexity_score: f32,
    /// Strategy the analyzer recommends.
    pub recommended_strategy: Strategy,
}

/// Whether `raw` uses search operators.
pub fn has_operators(raw: &str) -> bool {
    raw.contains(OPERATOR_CHARS)
        || raw.split_whitespace().any(|word| {
            OPERATOR_WORDS.contains(&word) || (word.len() > 1 && word.starts_with('-'))
        })
}

/// Complexity score for the given token and concept counts.
pub fn complexity(token_count: usize, concept_count: usize, operators: bool) -> f32 {
    let tokens = (token_count as f32 / 10.0).min(1.0);
    let concepts = (concept_count as f32 / 5.0).min(1.0);
    let operators = if operators { 1.0 } else { 0.0 };
    (0.4 * tokens + 0.4 * concepts + 0.2 * operators).clamp(0.0, 1.0)
}

/// Classifies queries against a shared [`ConceptVocabulary`].
#[derive(Clone, Debug)]
pub struct QueryAnalyzer {
    vocabulary: Arc<ConceptVocabulary>,
    complexity_threshold: f32,
    suggest_limit: usize,
}

impl QueryAnalyzer {
    /// Creates an analyzer with default thresholds.
    pub fn new(vocabulary: Arc<ConceptVocabulary>) -> Self {
        Self {
            vocabulary,
            complexity_threshold: DEFAULT_COMPLEXITY_THRESHOLD,
            suggest_limit: DEFAULT_SUGGEST_LIMIT,
        }
    }

    /// Creates an analyzer configured from `config`.
    pub fn from_config(vocabulary: Arc<ConceptVocabulary>, config: &EngineConfig) -> Self {
        Self::new(vocabulary)
            .with_complexity_threshold(config.complexity_threshold)
            .with_suggest_limit(config.suggest_limit)
    }

    /// Sets the complexity threshold for concept expansion.
    pub fn with_complexity_threshold(mut self, threshold: f32) -> Self {
        self.complexity_threshold = threshold;
        self
    }

    /// Sets the maximum number of suggestions.
    pub fn with_suggest_limit(mut self, limit: usize) -> Self {
        self.suggest_limit = limit;
        self
    }

    /// The shared vocabulary.
    pub fn vocabulary(&self) -> &ConceptVocabulary {
        &self.vocabulary
    }

    /// Analyzes `query`.
    ///
    /// Fails with [`Error::InvalidQuery`] when the query is empty or holds
    /// no searchable tokens.
    pub fn analyze(&self, query: &str) -> Result<QueryAnalysis> {
        let normalized_query = normalize_query(query);
        if normalized_query.is_empty() {
            return Err(Error::invalid_query("query is empty"));
        }

        let tokens = tokenize(&normalized_query);
        if tokens.is_empty() {
            return Err(Error::invalid_query("query has no searchable terms"));
        }

        let matches = self.vocabulary.find_matches(&tokens);
        let covered: usize = matches.iter().map(|m| m.len).sum();
        let detected_concepts = self.vocabulary.extract(&tokens);

        let complexity_score =
            complexity(tokens.len(), detected_concepts.len(), has_operators(query));

        let recommended_strategy = if detected_concepts.len() >= 2
            && complexity_score > self.complexity_threshold
        {
            Strategy::ConceptExpansion
        } else if covered == tokens.len() {
            Strategy::GraphOnly
        } else {
            Strategy::HybridBalanced
        };

        log::debug!(
            "Analyzed '{normalized_query}': {} concepts, complexity {complexity_score:.2}, {recommended_strategy}",
            detected_concepts.len()
        );

        Ok(QueryAnalysis {
            normalized_query,
            detected_concepts,
            complexity_score,
            recommended_strategy,
        })
    }

    /// Autocomplete suggestions for `partial`.
    pub fn suggest(&self, partial: &str) -> Vec<String> {
        self.vocabulary.suggest(partial, self.suggest_limit)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn analyzer() -> QueryAnalyzer {
        QueryAnalyzer::new(Arc::new(ConceptVocabulary::new([
            "FastAPI",
            "Authentication",
            "OAuth2",
            "Django",
            "Dependency Injection",
            "Pydantic",
            "Testing",
        ])))
    }

    #[test]
    fn test_empty_query_rejected() {
        let a = analyzer();
        assert!(matches!(a.analyze("").unwrap_err(), Error::InvalidQuery(_)));
        assert!(matches!(a.analyze(" \t\n").unwrap_err(), Error::InvalidQuery(_)));
        assert!(matches!(a.analyze("?? !!").unwrap_err(), Error::InvalidQuery(_)));
    }

    #[test]
    fn test_normalization() {
        let analysis = analyzer().analyze("  How   does FastAPI WORK ").unwrap();
        assert_eq!(analysis.normalized_query, "how does fastapi work");
        assert_eq!(analysis.detected_concepts, vec!["FastAPI"]);
    }

    #[test]
    fn test_all_entity_tokens_recommend_graph_only() {
        let analysis = analyzer().analyze("FastAPI authentication").unwrap();
        assert_eq!(analysis.detected_concepts, vec!["FastAPI", "Authentication"]);
        assert_eq!(analysis.recommended_strategy, Strategy::GraphOnly);
        assert!((analysis.complexity_score - 0.24).abs() < 1e-6);
    }

    #[test]
    fn test_free_text_recommends_hybrid() {
        let analysis = analyzer().analyze("how do I secure my api").unwrap();
        assert!(analysis.detected_concepts.is_empty());
        assert_eq!(analysis.recommended_strategy, Strategy::HybridBalanced);
    }

    #[test]
    fn test_complex_multi_concept_recommends_expansion() {
        let analysis = analyzer()
            .analyze("FastAPI AND Django (authentication OR oauth2) with pydantic testing")
            .unwrap();
        assert_eq!(
            analysis.detected_concepts,
            vec!["FastAPI", "Django", "Authentication", "OAuth2", "Pydantic", "Testing"]
        );
        assert!(analysis.complexity_score > 0.5);
        assert_eq!(analysis.recommended_strategy, Strategy::ConceptExpansion);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let a = analyzer().with_complexity_threshold(0.1);
        let analysis = a.analyze("FastAPI authentication").unwrap();
        assert_eq!(analysis.recommended_strategy, Strategy::ConceptExpansion);
    }

    #[test]
    fn test_operator_detection() {
        assert!(has_operators("fastapi AND django"));
        assert!(has_operators("\"exact phrase\""));
        assert!(has_operators("fastapi -django"));
        assert!(!has_operators("fastapi and django"));
        assert!(!has_operators("fastapi - django"));
    }

    #[test]
    fn test_complexity_bounds() {
        assert_eq!(complexity(0, 0, false), 0.0);
        assert!((complexity(100, 100, true) - 1.0).abs() < 1e-6);
        assert!((complexity(5, 0, false) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_suggest_uses_limit() {
        let a = analyzer().with_suggest_limit(1);
        assert_eq!(a.suggest("d"), vec!["Dependency Injection"]);
        assert_eq!(a.suggest("dj"), vec!["Django"]);
    }
}
