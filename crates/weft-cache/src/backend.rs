//! Cache backend trait and in-memory implementation.
//!
//! Backends store opaque payload bytes under a namespaced key and are
//! responsible for expiry. Encoding, compression, and failure isolation live
//! in [`crate::layer::CacheLayer`].
//!
//! # Backends
//!
//! - [`InMemoryCacheBackend`]: TTL-aware map, process-local
//! - `RedisCacheBackend`: shared cache (requires the `redis` feature)

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use weft_core::Result;

/// Compose the storage key for `key` within `namespace`.
pub fn storage_key(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

/// One stored payload.
///
/// Entries are immutable; a write always replaces the whole entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    /// Key within the namespace.
    pub key: String,
    /// Namespace (e.g. `results`, `analysis`).
    pub namespace: String,
    /// Encoded payload (see [`crate::codec`]).
    pub payload: Vec<u8>,
    /// When the entry stops being served.
    pub expires_at: Instant,
}

impl CacheEntry {
    /// Creates an entry expiring `ttl` from now.
    pub fn new(
        key: impl Into<String>,
        namespace: impl Into<String>,
        payload: Vec<u8>,
        ttl: Duration,
    ) -> Self {
        Self {
            key: key.into(),
            namespace: namespace.into(),
            payload,
            expires_at: Instant::now() + ttl,
        }
    }

    /// Whether the entry has expired.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time left before expiry (zero once expired).
    pub fn remaining_ttl(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// The namespaced storage key.
    pub fn storage_key(&self) -> String {
        storage_key(&self.namespace, &self.key)
    }
}

/// Abstract cache backend.
///
/// Errors returned here are reported as [`weft_core::Error::CacheBackend`]
/// and count against the circuit breaker; they never reach a search caller.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetches the live payload stored under `key` in `namespace`.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `entry`, replacing any previous entry under the same key.
    async fn set(&self, entry: CacheEntry) -> Result<()>;

    /// Removes the entry under `key` in `namespace`, if any.
    async fn delete(&self, namespace: &str, key: &str) -> Result<()>;

    /// Backend name for diagnostics.
    fn name(&self) -> &str;
}

// ============================================================================
// InMemoryCacheBackend
// ============================================================================

/// Process-local cache backend.
///
/// Expired entries are never served and are dropped lazily on read or by
/// [`purge_expired`](Self::purge_expired).
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCacheBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no entries are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops every expired entry; returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let storage_key = storage_key(namespace, key);
        {
            let entries = self.entries.read().await;
            match entries.get(&storage_key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.payload.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(&storage_key).is_some_and(CacheEntry::is_expired) {
            entries.remove(&storage_key);
        }
        Ok(None)
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        let storage_key = entry.storage_key();
        self.entries.write().await.insert(storage_key, entry);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .remove(&storage_key(namespace, key));
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

// ============================================================================
// Tests
// ============================================================================
