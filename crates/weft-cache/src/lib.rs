//! Result and analysis caching for the Weft query engine.
//!
//! - [`CacheLayer`]: typed get/set with compression, metrics, and a circuit
//!   breaker; never fails its caller
//! - [`CacheBackend`]: the storage seam, with [`InMemoryCacheBackend`]
//!   bundled and `RedisCacheBackend` behind the `redis` feature
//! - [`CircuitBreaker`]: explicit Closed / Open / HalfOpen state machine
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use weft_cache::{CacheLayer, InMemoryCacheBackend};
//!
//! # tokio_test::block_on(async {
//! let cache = CacheLayer::new(Arc::new(InMemoryCacheBackend::new()));
//! cache.set("fastapi auth", &vec!["c1", "c2"], "results", Duration::from_secs(60)).await;
//! let hit: Option<Vec<String>> = cache.get("fastapi auth", "results").await;
//! assert_eq!(hit, Some(vec!["c1".to_string(), "c2".to_string()]));
//! # });
//! ```

pub mod backend;
pub mod breaker;
pub mod codec;
pub mod layer;

#[cfg(feature = "redis")]
pub mod redis;

pub use backend::{CacheBackend, CacheEntry, InMemoryCacheBackend};
pub use breaker::{BreakerState, CircuitBreaker};
pub use layer::{CacheLayer, CacheMetrics};

#[cfg(feature = "redis")]
pub use crate::redis::RedisCacheBackend;
