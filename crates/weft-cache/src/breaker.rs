//! Circuit breaker guarding the cache backend.
//!
//! ```text
//!            threshold consecutive failures
//!   Closed ──────────────────────────────────▶ Open
//!     ▲                                          │
//!     │ probe succeeds            cooldown elapsed│
//!     │                                          ▼
//!     └──────────────────────────────────── HalfOpen
//!                 probe fails: back to Open
//! ```
//!
//! While open, callers skip the backend entirely. After the cooldown a
//! single probe call is admitted; concurrent callers keep skipping until it
//! reports back. A half-open call that never reports (its future was dropped)
//! is abandoned after another cooldown and a fresh call is admitted.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Breaker state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Calls flow to the backend.
    Closed,
    /// Calls are skipped until the cooldown elapses.
    Open,
    /// One probe call is in flight or about to be.
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_started_at: Option<Instant>,
}

/// Consecutive-failure circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker that opens after `threshold` consecutive
    /// failures (at least 1) and probes again after `cooldown`.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_started_at: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state, advancing Open to HalfOpen if the cooldown elapsed.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.advance(&mut inner);
        inner.state
    }

    /// Consecutive failures seen while closed.
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    fn advance(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open
            && inner
                .opened_at
                .is_some_and(|opened| opened.elapsed() >= self.cooldown)
        {
            log::info!("Cache circuit half-open; admitting a probe");
            inner.state = BreakerState::HalfOpen;
            inner.trial_started_at = None;
        }
        if inner.state == BreakerState::HalfOpen
            && inner
                .trial_started_at
                .is_some_and(|started| started.elapsed() >= self.cooldown)
        {
            log::warn!("Half-open cache call never reported back; admitting another");
            inner.trial_started_at = None;
        }
    }

    /// Asks to call the backend. `false` means skip it.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.lock();
        self.advance(&mut inner);
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen if inner.trial_started_at.is_some() => false,
            BreakerState::HalfOpen => {
                inner.trial_started_at = Some(Instant::now());
                true
            }
        }
    }

    /// Reports a successful backend call.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != BreakerState::Closed {
            log::info!("Cache circuit closed after successful probe");
        }
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_started_at = None;
    }

    /// Reports a failed backend call.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                if inner.consecutive_failures >= self.threshold {
                    log::warn!(
                        "Cache circuit open after {} consecutive failures; bypassing for {:?}",
                        inner.consecutive_failures,
                        self.cooldown
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen | BreakerState::Open => {
                log::warn!("Cache probe failed; circuit reopened");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.trial_started_at = None;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
