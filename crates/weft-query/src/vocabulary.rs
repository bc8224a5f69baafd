//! Concept vocabulary for query analysis and autocomplete.
//!
//! The vocabulary is the set of known entity names (frameworks, topics,
//! sources). It is built once at startup, either from an explicit term list
//! or from the graph's node names, and shared read-only.

use std::collections::{HashMap, HashSet};

use weft_core::{RequestContext, Result, normalize_query, tokenize};
use weft_graph::GraphSearchAdapter;

#[derive(Clone, Debug)]
struct Term {
    canonical: String,
    normalized: String,
    tokens: Vec<String>,
}

/// A match of a vocabulary term against a token sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConceptMatch {
    /// Canonical spelling of the matched term.
    pub concept: String,
    /// Index of the first matched token.
    pub start: usize,
    /// Number of tokens matched.
    pub len: usize,
}

/// Known entity names with multi-word, longest-match-first lookup.
#[derive(Clone, Debug, Default)]
pub struct ConceptVocabulary {
    terms: Vec<Term>,
    by_key: HashMap<String, usize>,
    max_tokens: usize,
}

impl ConceptVocabulary {
    /// Builds a vocabulary from terms.
    ///
    /// Terms are matched case-insensitively and without punctuation; the
    /// first spelling seen for a term is its canonical form.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocabulary = Self::default();
        for term in terms {
            vocabulary.insert(term.as_ref());
        }
        vocabulary
    }

    /// Builds a vocabulary from the graph's framework, source, and topic
    /// names.
    pub async fn from_graph(graph: &GraphSearchAdapter, ctx: &RequestContext) -> Result<Self> {
        let names = graph.vocabulary(ctx).await?;
        let vocabulary = Self::new(names);
        log::info!("Built concept vocabulary with {} terms from graph", vocabulary.len());
        Ok(vocabulary)
    }

    fn insert(&mut self, term: &str) {
        let tokens = tokenize(term);
        if tokens.is_empty() {
            return;
        }
        let key = tokens.join(" ");
        if self.by_key.contains_key(&key) {
            return;
        }
        self.max_tokens = self.max_tokens.max(tokens.len());
        self.by_key.insert(key, self.terms.len());
        self.terms.push(Term {
            canonical: term.trim().to_string(),
            normalized: normalize_query(term),
            tokens,
        });
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the vocabulary has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Canonical spellings, in insertion order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.canonical.as_str())
    }

    /// Whether `term` is a known concept.
    pub fn contains(&self, term: &str) -> bool {
        self.by_key.contains_key(&tokenize(term).join(" "))
    }

    /// Finds concepts in `tokens`, longest match first, scanning left to
    /// right. Matches never overlap.
    pub fn find_matches(&self, tokens: &[String]) -> Vec<ConceptMatch> {
        let mut matches = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let longest = self.max_tokens.min(tokens.len() - i);
            let found = (1..=longest).rev().find_map(|len| {
                self.by_key
                    .get(&tokens[i..i + len].join(" "))
                    .map(|&idx| (idx, len))
            });
            match found {
                Some((idx, len)) => {
                    matches.push(ConceptMatch {
                        concept: self.terms[idx].canonical.clone(),
                        start: i,
                        len,
                    });
                    i += len;
                }
                None => i += 1,
            }
        }
        matches
    }

    /// Distinct concepts in `tokens`, in order of first appearance.
    pub fn extract(&self, tokens: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        self.find_matches(tokens)
            .into_iter()
            .filter(|m| seen.insert(m.concept.clone()))
            .map(|m| m.concept)
            .collect()
    }

    /// Terms starting with `partial`, for autocomplete.
    ///
    /// Terms whose whole name starts with the partial come first, then terms
    /// with any later word starting with it; each group is alphabetical.
    pub fn suggest(&self, partial: &str, limit: usize) -> Vec<String> {
        let prefix = normalize_query(partial);
        if prefix.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut whole: Vec<&Term> = Vec::new();
        let mut word: Vec<&Term> = Vec::new();
        for term in &self.terms {
            if term.normalized.starts_with(&prefix) {
                whole.push(term);
            } else if term.tokens.iter().skip(1).any(|t| t.starts_with(&prefix)) {
                word.push(term);
            }
        }

        let alphabetical = |a: &&Term, b: &&Term| {
            a.normalized
                .cmp(&b.normalized)
                .then_with(|| a.canonical.cmp(&b.canonical))
        };
        whole.sort_by(alphabetical);
        word.sort_by(alphabetical);

        whole
            .into_iter()
            .chain(word)
            .take(limit)
            .map(|t| t.canonical.clone())
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
