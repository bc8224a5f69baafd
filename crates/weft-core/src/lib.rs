//! Weft Core: shared types, errors, configuration, and request plumbing.
//!
//! This crate provides the foundational types used across all Weft crates.
//! It has no internal Weft dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error taxonomy and Result alias
//! - [`types`]: `Chunk`, `SearchResult`, `Signal`, `Strategy`
//! - [`config`]: `EngineConfig` (defaults → TOML → `WEFT_*` env)
//! - [`context`]: Per-request deadline and cancellation
//! - [`pool`]: Bounded backend connection pools
//! - [`retry`]: Adapter-level retry with exponential backoff
//! - [`util`]: Text normalization helpers

pub mod config;
pub mod context;
pub mod error;
pub mod pool;
pub mod retry;
pub mod types;
pub mod util;

// Re-export key types at crate root for convenience
pub use config::EngineConfig;
pub use context::RequestContext;
pub use error::{Error, Result};
pub use pool::{ConnectionPool, PooledSlot};
pub use retry::RetryPolicy;
pub use types::{Chunk, SearchResult, Signal, Strategy};

// Convenience re-exports from util
pub use util::text::{concept_slug, normalize_query, snippet, tokenize};

// Re-exported so downstream crates share one token type.
pub use tokio_util::sync::CancellationToken;
