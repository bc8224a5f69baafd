//! The cache layer in front of a [`CacheBackend`].
//!
//! [`CacheLayer`] adds typed access (JSON, gzip above a threshold), metrics,
//! and a circuit breaker. It never fails a caller: backend errors degrade to
//! "not found" on reads and to no-ops on writes. A backend call that outlives
//! the call timeout is abandoned and counts as a failure.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use weft_core::EngineConfig;

use crate::backend::{CacheBackend, CacheEntry};
use crate::breaker::{BreakerState, CircuitBreaker};
use crate::codec;

/// Default payload size above which entries are compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

/// Point-in-time cache counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheMetrics {
    /// Reads that returned a value.
    pub hits: u64,
    /// Reads that found nothing (including undecodable payloads).
    pub misses: u64,
    /// Successful writes.
    pub writes: u64,
    /// Successful writes whose payload was compressed.
    pub compressed_writes: u64,
    /// Backend and codec errors.
    pub errors: u64,
    /// Calls skipped because the breaker was open.
    pub bypassed: u64,
    /// Breaker state at snapshot time.
    pub breaker_state: BreakerState,
}

impl CacheMetrics {
    /// Fraction of answered reads that were hits.
    pub fn hit_rate(&self) -> f64 {
        let reads = self.hits + self.misses;
        if reads == 0 {
            0.0
        } else {
            self.hits as f64 / reads as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    compressed_writes: AtomicU64,
    errors: AtomicU64,
    bypassed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Typed, failure-isolated cache.
pub struct CacheLayer {
    backend: Arc<dyn CacheBackend>,
    breaker: CircuitBreaker,
    compression_threshold: usize,
    call_timeout: Duration,
    counters: Counters,
}

impl CacheLayer {
    /// Creates a layer with default breaker and compression settings.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        let defaults = EngineConfig::default();
        Self::from_config(backend, &defaults)
    }

    /// Creates a layer configured from `config`.
    pub fn from_config(backend: Arc<dyn CacheBackend>, config: &EngineConfig) -> Self {
        Self {
            backend,
            breaker: CircuitBreaker::new(
                config.circuit_breaker_threshold,
                config.circuit_breaker_cooldown(),
            ),
            compression_threshold: config.compression_threshold_bytes,
            call_timeout: config.cache_timeout(),
            counters: Counters::default(),
        }
    }

    /// Replaces the circuit breaker.
    pub fn with_breaker(mut self, threshold: u32, cooldown: Duration) -> Self {
        self.breaker = CircuitBreaker::new(threshold, cooldown);
        self
    }

    /// Sets the compression threshold in bytes.
    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    /// Sets how long one backend call may take.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Name of the backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Current breaker state.
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Looks up `key` in `namespace`.
    ///
    /// Returns `None` when absent or expired, when the payload cannot be
    /// decoded, when the backend fails or stalls, and while the breaker is open.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, namespace: &str) -> Option<T> {
        if !self.breaker.try_acquire() {
            Counters::bump(&self.counters.bypassed);
            return None;
        }

        let Some(payload) = self.call("read", self.backend.get(namespace, key)).await? else {
            Counters::bump(&self.counters.misses);
            return None;
        };

        match codec::decode(&payload) {
            Ok(value) => {
                Counters::bump(&self.counters.hits);
                Some(value)
            }
            Err(e) => {
                Counters::bump(&self.counters.errors);
                Counters::bump(&self.counters.misses);
                log::warn!("Discarding undecodable cache entry {namespace}:{key}: {e}");
                None
            }
        }
    }

    /// Stores `value` under `key` in `namespace` for `ttl`.
    ///
    /// A zero TTL stores nothing. Failures are logged and counted, never
    /// returned.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        namespace: &str,
        ttl: Duration,
    ) {
        if ttl.is_zero() {
            return;
        }

        let encoded = match codec::encode(value, self.compression_threshold) {
            Ok(encoded) => encoded,
            Err(e) => {
                Counters::bump(&self.counters.errors);
                log::warn!("Could not encode cache entry {namespace}:{key}: {e}");
                return;
            }
        };

        if !self.breaker.try_acquire() {
            Counters::bump(&self.counters.bypassed);
            return;
        }

        let entry = CacheEntry::new(key, namespace, encoded.bytes, ttl);
        if self.call("write", self.backend.set(entry)).await.is_some() {
            Counters::bump(&self.counters.writes);
            if encoded.compressed {
                Counters::bump(&self.counters.compressed_writes);
            }
        }
    }

    /// Removes `key` from `namespace`. Failures are logged, never returned.
    pub async fn invalidate(&self, key: &str, namespace: &str) {
        if !self.breaker.try_acquire() {
            Counters::bump(&self.counters.bypassed);
            return;
        }
        self.call("delete", self.backend.delete(namespace, key)).await;
    }

    /// Runs one admitted backend call under the call timeout and reports the
    /// result to the breaker.
    async fn call<T, F>(&self, op: &str, fut: F) -> Option<T>
    where
        F: Future<Output = weft_core::Result<T>>,
    {
        let error = match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => {
                self.breaker.record_success();
                return Some(value);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no answer within {}ms", self.call_timeout.as_millis()),
        };
        self.breaker.record_failure();
        Counters::bump(&self.counters.errors);
        log::warn!("Cache {op} failed on '{}': {error}", self.backend.name());
        None
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheMetrics {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheMetrics {
            hits: load(&self.counters.hits),
            misses: load(&self.counters.misses),
            writes: load(&self.counters.writes),
            compressed_writes: load(&self.counters.compressed_writes),
            errors: load(&self.counters.errors),
            bypassed: load(&self.counters.bypassed),
            breaker_state: self.breaker.state(),
        }
    }
}

impl std::fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("backend", &self.backend.name())
            .field("breaker", &self.breaker.state())
            .field("compression_threshold", &self.compression_threshold)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
