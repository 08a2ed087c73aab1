//! Resilience primitives shared by every caption backend: a generic
//! three-state circuit breaker and an exponential-backoff retry loop.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub mod retry;

pub use retry::{with_retry, RetryPolicy};

/// Breaker position in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Calls pass through; consecutive failures are counted.
    Closed,
    /// Calls are rejected without invoking the operation.
    Open,
    /// Probing: calls pass through, one failure reopens.
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in `Closed` before the breaker opens
    pub failure_threshold: u32,

    /// How long the breaker stays open before probing again
    pub open_timeout_ms: u64,

    /// Consecutive `HalfOpen` successes required to close
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout_ms: 30_000,
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

/// Failure returned by [`CircuitBreaker::execute`]
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The breaker rejected the call without invoking the operation.
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    /// The operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }
}

/// Point-in-time view of the breaker for observability
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub config: CircuitBreakerConfig,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    /// Monotonic clock for the open-timeout check
    opened_at: Option<Instant>,
    /// Wall clock for snapshots
    last_failure_at: Option<DateTime<Utc>>,
}

/// Generic three-state circuit breaker.
///
/// Knows nothing about transcripts; guards any async operation returning a
/// `Result`. One instance is shared (via `Arc`) across all strategies and all
/// concurrent requests of an orchestrator, so a burst of failures from any
/// backend fails every backend fast until the open timeout elapses.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
                last_failure_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `operation` through the breaker.
    ///
    /// While `Open` and before the open timeout elapses, the operation is not
    /// invoked and the distinguished [`BreakerError::Open`] is returned. The
    /// first call after the timeout transitions to `HalfOpen` and is attempted.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            return Err(BreakerError::Open {
                name: self.name.clone(),
            });
        }

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(BreakerError::Inner(err))
            }
        }
    }

    /// Force the breaker back to `Closed` with zeroed counters.
    pub fn reset(&self) {
        let mut inner = self.lock_inner();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.opened_at = None;
        tracing::debug!(breaker = %self.name, "circuit breaker reset");
    }

    pub fn is_healthy(&self) -> bool {
        self.lock_inner().state != CircuitState::Open
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.lock_inner();
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_at: inner.last_failure_at,
            config: self.config.clone(),
        }
    }

    /// Decide whether a call may proceed, moving `Open` to `HalfOpen` once the
    /// open timeout has elapsed.
    fn try_acquire(&self) -> bool {
        let mut inner = self.lock_inner();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.open_timeout() {
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                    tracing::info!(breaker = %self.name, "circuit breaker half-open, probing");
                    true
                } else {
                    false
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock_inner();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.opened_at = None;
                    tracing::info!(breaker = %self.name, "circuit breaker closed");
                }
            }
            // A call admitted before the breaker opened may finish late.
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock_inner();
        inner.last_failure_at = Some(Utc::now());
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        breaker = %self.name,
                        failures = inner.failure_count,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.success_count = 0;
                inner.opened_at = Some(Instant::now());
                tracing::warn!(breaker = %self.name, "circuit breaker reopened from half-open");
            }
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
            }
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        // A poisoned lock means a panic mid-bookkeeping; the counters are
        // still usable, so recover the guard.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            open_timeout_ms: 1_000,
            success_threshold: 2,
        }
    }

    async fn fail(breaker: &CircuitBreaker) {
        let result: Result<(), _> = breaker.execute(|| async { Err::<(), _>("boom") }).await;
        assert!(result.is_err());
    }

    async fn succeed(breaker: &CircuitBreaker) {
        let result = breaker.execute(|| async { Ok::<_, &str>(()) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_closed_passes_through_and_success_resets_count() {
        let breaker = CircuitBreaker::new("test", test_config());
        fail(&breaker).await;
        fail(&breaker).await;
        succeed(&breaker).await;
        assert_eq!(breaker.snapshot().failure_count, 0);
        assert_eq!(breaker.snapshot().state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_opens_after_exactly_threshold_failures() {
        let breaker = CircuitBreaker::new("test", test_config());
        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.snapshot().state, CircuitState::Closed);
        fail(&breaker).await;
        assert_eq!(breaker.snapshot().state, CircuitState::Open);
        assert!(!breaker.is_healthy());
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking_operation() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..3 {
            fail(&breaker).await;
        }

        let calls = AtomicU32::new(0);
        let result = breaker
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_timeout_then_closes_on_two_successes() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..3 {
            fail(&breaker).await;
        }

        tokio::time::advance(Duration::from_millis(1_001)).await;

        succeed(&breaker).await;
        assert_eq!(breaker.snapshot().state, CircuitState::HalfOpen);
        succeed(&breaker).await;
        assert_eq!(breaker.snapshot().state, CircuitState::Closed);
        assert_eq!(breaker.snapshot().failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..3 {
            fail(&breaker).await;
        }

        tokio::time::advance(Duration::from_millis(1_001)).await;

        fail(&breaker).await;
        assert_eq!(breaker.snapshot().state, CircuitState::Open);

        // Still inside the fresh open window: rejected again.
        let result: Result<(), _> = breaker.execute(|| async { Ok::<(), &str>(()) }).await;
        assert!(matches!(result, Err(BreakerError::Open { .. })));
    }

    #[tokio::test]
    async fn test_reset_returns_to_closed() {
        let breaker = CircuitBreaker::new("test", test_config());
        for _ in 0..3 {
            fail(&breaker).await;
        }
        breaker.reset();
        assert_eq!(breaker.snapshot().state, CircuitState::Closed);
        succeed(&breaker).await;
    }

    #[tokio::test]
    async fn test_generic_over_operation_type() {
        let breaker = CircuitBreaker::new("generic", test_config());
        let value = breaker
            .execute(|| async { Ok::<_, String>(42u64) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }
}
