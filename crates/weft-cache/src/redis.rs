//! Redis cache backend.
//!
//! Payloads are stored with `SET key value EX ttl` through a
//! [`ConnectionManager`], which reconnects on its own; each call clones the
//! manager handle. Keys are `<prefix>:<namespace>:<key>`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use weft_core::{Error, Result};

use crate::backend::{CacheBackend, CacheEntry, storage_key};

/// Default key prefix.
pub const DEFAULT_PREFIX: &str = "weft";

/// Cache backend backed by a Redis server.
#[derive(Clone)]
pub struct RedisCacheBackend {
    conn: ConnectionManager,
    prefix: String,
}

fn cache_error(context: &str, e: redis::RedisError) -> Error {
    Error::cache(format!("redis {context}: {e}"))
}

impl RedisCacheBackend {
    /// Connects to the Redis server at `url` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| cache_error("open", e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| cache_error("connect", e))?;
        log::info!("Connected Redis cache backend at {url}");
        Ok(Self {
            conn,
            prefix: DEFAULT_PREFIX.to_string(),
        })
    }

    /// Sets the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn key(&self, namespace: &str, key: &str) -> String {
        format!("{}:{}", self.prefix, storage_key(namespace, key))
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(self.key(namespace, key))
            .query_async::<Option<Vec<u8>>>(&mut conn)
            .await
            .map_err(|e| cache_error("GET", e))
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        let ttl_secs = entry.remaining_ttl().as_secs().max(1);
        let key = self.key(&entry.namespace, &entry.key);
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(entry.payload)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| cache_error("SET", e))
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(self.key(namespace, key))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| cache_error("DEL", e))
    }

    fn name(&self) -> &str {
        "redis"
    }
}

impl std::fmt::Debug for RedisCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheBackend")
            .field("prefix", &self.prefix)
            .finish()
    }
}
