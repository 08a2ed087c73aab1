//! Exponential-backoff retry loop with jitter, consulting the error
//! classifier to decide whether another attempt can help.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::classify::ExtractionError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first (total attempts = max_retries + 1)
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after the given 1-based failed attempt:
    /// `min(base * 2^(attempt-1), max)`, jittered by up to ±25% when enabled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let exponential = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);

        if self.jitter {
            Duration::from_millis((exponential as f64 * jitter_factor()) as u64)
        } else {
            Duration::from_millis(exponential)
        }
    }
}

/// Uniform factor in `[0.75, 1.25]` derived from the subsecond clock.
fn jitter_factor() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    0.75 + 0.5 * (f64::from(nanos) / 1_000_000_000.0)
}

/// Run `operation` up to `max_retries + 1` times.
///
/// A failure classified non-retryable is returned immediately; exhausting all
/// attempts returns the last observed failure.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ExtractionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExtractionError>>,
{
    let mut attempt: u32 = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() {
                    tracing::debug!(kind = %err.kind, "failure is not retryable, giving up");
                    return Err(err);
                }
                if attempt > policy.max_retries {
                    tracing::debug!(attempts = attempt, "retry budget exhausted");
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    kind = %err.kind,
                    "retrying after backoff"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
