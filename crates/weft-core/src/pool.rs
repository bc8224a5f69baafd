//! Bounded backend connection pools.
//!
//! A [`ConnectionPool`] caps the number of concurrent calls into one backend.
//! When every slot is taken, acquisition waits (it never fails fast) until a
//! slot frees up or the request deadline elapses.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Shared, bounded pool of backend slots.
///
/// Cheap to clone (Arc internals).
#[derive(Clone)]
pub struct ConnectionPool {
    name: Arc<str>,
    size: usize,
    permits: Arc<Semaphore>,
}

/// A held pool slot; released on drop.
#[derive(Debug)]
pub struct PooledSlot {
    _permit: OwnedSemaphorePermit,
}

impl ConnectionPool {
    /// Creates a pool named `name` with `size` slots (at least one).
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        let size = size.max(1);
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            size,
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    /// Pool name, used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured number of slots.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a slot, bounded by the request's deadline and cancellation.
    pub async fn acquire(&self, ctx: &RequestContext) -> Result<PooledSlot> {
        let permits = Arc::clone(&self.permits);
        let name = Arc::clone(&self.name);
        let permit = ctx
            .guard(async move {
                permits
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::backend_unavailable(&*name, "connection pool closed"))
            })
            .await?;

        if self.available() == 0 {
            log::debug!("Pool '{}' exhausted ({} slots in use)", self.name, self.size);
        }
        Ok(PooledSlot { _permit: permit })
    }

    /// Closes the pool; pending and future acquisitions fail.
    pub fn close(&self) {
        self.permits.close();
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("available", &self.available())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let pool = ConnectionPool::new("vector", 2);
        let ctx = RequestContext::new(Duration::from_secs(1));

        let a = pool.acquire(&ctx).await.unwrap();
        let b = pool.acquire(&ctx).await.unwrap();
        assert_eq!(pool.available(), 0);

        drop(a);
        assert_eq!(pool.available(), 1);
        drop(b);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_pool_blocks_until_deadline() {
        let pool = ConnectionPool::new("graph", 1);
        let ctx = RequestContext::new(Duration::from_millis(100));
        let _held = pool.acquire(&ctx).await.unwrap();

        let err = pool.acquire(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_pool_waits_for_release() {
        let pool = ConnectionPool::new("graph", 1);
        let ctx = RequestContext::new(Duration::from_secs(5));
        let held = pool.acquire(&ctx).await.unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(held);
        });

        assert!(pool.acquire(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_pool() {
        let pool = ConnectionPool::new("vector", 1);
        pool.close();
        let ctx = RequestContext::new(Duration::from_secs(1));
        let err = pool.acquire(&ctx).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_zero_size_is_clamped() {
        let pool = ConnectionPool::new("tiny", 0);
        assert_eq!(pool.size(), 1);
        assert!(format!("{pool:?}").contains("tiny"));
    }
}
