//! Engine configuration.
//!
//! [`EngineConfig`] is a flat struct with a serde default for every field, so
//! a TOML file only needs to name the values it changes. Values are resolved
//! in three layers:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`EngineConfig::from_toml_file`)
//! 3. `WEFT_*` environment variables (`EngineConfig::apply_env`)
//!
//! `EngineConfig::load` runs all three and validates the result.
//!
//! ```rust
//! use weft_core::EngineConfig;
//!
//! let config: EngineConfig = toml::from_str("semantic_weight = 0.7\ngraph_weight = 0.3").unwrap();
//! assert_eq!(config.max_traversal_depth, 2);
//! assert!(config.validate().is_ok());
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Strategy;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "WEFT_";

/// Upper bound for graph traversal depth.
pub const MAX_TRAVERSAL_DEPTH: usize = 10;

/// Query engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fusion weight of the semantic signal.
    pub semantic_weight: f32,
    /// Fusion weight of the graph signal.
    pub graph_weight: f32,
    /// Strategy used when neither the caller nor the analyzer picks one.
    ///
    /// `None` means "use the analyzer's recommendation".
    pub default_strategy: Option<Strategy>,
    /// TTL for cached result sets.
    pub cache_ttl_seconds: u64,
    /// TTL for cached query analyses.
    pub analysis_ttl_seconds: u64,
    /// Graph traversal depth (hops).
    pub max_traversal_depth: usize,
    /// Per-request deadline covering every backend call.
    pub request_deadline_ms: u64,
    /// Consecutive cache failures before the breaker opens.
    pub circuit_breaker_threshold: u32,
    /// How long the breaker stays open before a probe.
    pub circuit_breaker_cooldown_ms: u64,
    /// Time allowed for one cache backend call before it counts as failed.
    pub cache_timeout_ms: u64,
    /// Result limit when the caller gives none.
    pub default_limit: usize,
    /// Minimum chunk quality score admitted to semantic ranking.
    pub quality_threshold: f32,
    /// Cosine similarity at or below which candidates are dropped.
    pub min_similarity: f32,
    /// Payload size above which cache entries are compressed.
    pub compression_threshold_bytes: usize,
    /// Complexity above which multi-concept queries use concept expansion.
    pub complexity_threshold: f32,
    /// Minimum normalized similarity for fuzzy node-name matches.
    pub fuzzy_match_threshold: f64,
    /// How many first-stage results seed the second stage of sequential
    /// strategies.
    pub seed_top_k: usize,
    /// Cap on search terms after concept expansion.
    pub max_expansion_terms: usize,
    /// Concurrent vector backend connections.
    pub vector_pool_size: usize,
    /// Concurrent graph backend connections.
    pub graph_pool_size: usize,
    /// Base delay of the adapter retry backoff.
    pub retry_base_delay_ms: u64,
    /// Latency target; slower requests are logged and counted.
    pub latency_budget_ms: u64,
    /// Snippet length in characters.
    pub snippet_length: usize,
    /// Maximum number of autocomplete suggestions.
    pub suggest_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.6,
            graph_weight: 0.4,
            default_strategy: None,
            cache_ttl_seconds: 300,
            analysis_ttl_seconds: 3600,
            max_traversal_depth: 2,
            request_deadline_ms: 5000,
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown_ms: 30_000,
            cache_timeout_ms: 50,
            default_limit: 10,
            quality_threshold: 0.0,
            min_similarity: 0.0,
            compression_threshold_bytes: 1024,
            complexity_threshold: 0.5,
            fuzzy_match_threshold: 0.85,
            seed_top_k: 3,
            max_expansion_terms: 8,
            vector_pool_size: 16,
            graph_pool_size: 16,
            retry_base_delay_ms: 100,
            latency_budget_ms: 100,
            snippet_length: 200,
            suggest_limit: 10,
        }
    }
}

impl EngineConfig {
    /// Loads configuration: defaults, then the optional TOML file, then
    /// `WEFT_*` environment overrides. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Serializes to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Applies `WEFT_<FIELD>` overrides using `lookup` to read variables.
    ///
    /// Taking the lookup as a closure keeps this testable without touching
    /// the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |field: &str| lookup(&format!("{ENV_PREFIX}{}", field.to_uppercase()));

        override_parsed(&get, "semantic_weight", &mut self.semantic_weight)?;
        override_parsed(&get, "graph_weight", &mut self.graph_weight)?;
        if let Some(raw) = get("default_strategy") {
            self.default_strategy = if raw.trim().is_empty() || raw.eq_ignore_ascii_case("auto") {
                None
            } else {
                Some(raw.parse()?)
            };
        }
        override_parsed(&get, "cache_ttl_seconds", &mut self.cache_ttl_seconds)?;
        override_parsed(&get, "analysis_ttl_seconds", &mut self.analysis_ttl_seconds)?;
        override_parsed(&get, "max_traversal_depth", &mut self.max_traversal_depth)?;
        override_parsed(&get, "request_deadline_ms", &mut self.request_deadline_ms)?;
        override_parsed(&get, "circuit_breaker_threshold", &mut self.circuit_breaker_threshold)?;
        override_parsed(&get, "circuit_breaker_cooldown_ms", &mut self.circuit_breaker_cooldown_ms)?;
        override_parsed(&get, "cache_timeout_ms", &mut self.cache_timeout_ms)?;
        override_parsed(&get, "default_limit", &mut self.default_limit)?;
        override_parsed(&get, "quality_threshold", &mut self.quality_threshold)?;
        override_parsed(&get, "min_similarity", &mut self.min_similarity)?;
        override_parsed(&get, "compression_threshold_bytes", &mut self.compression_threshold_bytes)?;
        override_parsed(&get, "complexity_threshold", &mut self.complexity_threshold)?;
        override_parsed(&get, "fuzzy_match_threshold", &mut self.fuzzy_match_threshold)?;
        override_parsed(&get, "seed_top_k", &mut self.seed_top_k)?;
        override_parsed(&get, "max_expansion_terms", &mut self.max_expansion_terms)?;
        override_parsed(&get, "vector_pool_size", &mut self.vector_pool_size)?;
        override_parsed(&get, "graph_pool_size", &mut self.graph_pool_size)?;
        override_parsed(&get, "retry_base_delay_ms", &mut self.retry_base_delay_ms)?;
        override_parsed(&get, "latency_budget_ms", &mut self.latency_budget_ms)?;
        override_parsed(&get, "snippet_length", &mut self.snippet_length)?;
        override_parsed(&get, "suggest_limit", &mut self.suggest_limit)?;
        Ok(())
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("semantic_weight", self.semantic_weight),
            ("graph_weight", self.graph_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::config(format!(
                    "{name} must be a finite, non-negative number (got {weight})"
                )));
            }
        }
        if self.semantic_weight + self.graph_weight <= 0.0 {
            return Err(Error::config(
                "semantic_weight + graph_weight must be greater than zero",
            ));
        }
        if self.max_traversal_depth == 0 || self.max_traversal_depth > MAX_TRAVERSAL_DEPTH {
            return Err(Error::config(format!(
                "max_traversal_depth must be between 1 and {MAX_TRAVERSAL_DEPTH}"
            )));
        }
        if self.request_deadline_ms == 0 {
            return Err(Error::config("request_deadline_ms must be greater than zero"));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(Error::config(
                "circuit_breaker_threshold must be greater than zero",
            ));
        }
        if self.cache_timeout_ms == 0 {
            return Err(Error::config("cache_timeout_ms must be greater than zero"));
        }
        if self.default_limit == 0 {
            return Err(Error::config("default_limit must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(Error::config("quality_threshold must be within [0, 1]"));
        }
        if !(-1.0..=1.0).contains(&self.min_similarity) {
            return Err(Error::config("min_similarity must be within [-1, 1]"));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_match_threshold) {
            return Err(Error::config("fuzzy_match_threshold must be within [0, 1]"));
        }
        if self.vector_pool_size == 0 || self.graph_pool_size == 0 {
            return Err(Error::config("pool sizes must be greater than zero"));
        }
        Ok(())
    }

    /// Request deadline as a `Duration`.
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    /// Result-set cache TTL as a `Duration`.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Analysis cache TTL as a `Duration`.
    pub fn analysis_ttl(&self) -> Duration {
        Duration::from_secs(self.analysis_ttl_seconds)
    }

    /// Breaker cooldown as a `Duration`.
    pub fn circuit_breaker_cooldown(&self) -> Duration {
        Duration::from_millis(self.circuit_breaker_cooldown_ms)
    }

    /// Cache call timeout as a `Duration`.
    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    /// Retry base delay as a `Duration`.
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Latency budget as a `Duration`.
    pub fn latency_budget(&self) -> Duration {
        Duration::from_millis(self.latency_budget_ms)
    }
}

fn override_parsed<G, T>(get: &G, field: &str, slot: &mut T) -> Result<()>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = get(field) {
        *slot = raw.trim().parse().map_err(|e| {
            Error::config(format!(
                "{ENV_PREFIX}{}: cannot parse {raw:?}: {e}",
                field.to_uppercase()
            ))
        })?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
