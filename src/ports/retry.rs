//! Retry Policy - Bounded Fixed-Delay Retries
//!
//! One policy value replaces the per-call retry loops scattered through
//! the original call sites. Fixed delay (the portal punishes exponential
//! patience with more flakiness, not less), bounded attempts, and an
//! idempotency flag that hard-disables retries for submission calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use super::portal::PortalError;

/// Bounded fixed-delay retry configuration for one portal operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Clamped to at least 1.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
    /// Non-idempotent operations run exactly once no matter what
    /// `attempts` says.
    pub idempotent: bool,
}

impl RetryPolicy {
    /// Policy for an idempotent read: up to `attempts` tries, fixed delay.
    pub fn idempotent(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay,
            idempotent: true,
        }
    }

    /// Policy for a submission: exactly one attempt, ever.
    pub fn submit_once() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
            idempotent: false,
        }
    }

    /// Run `op` under this policy, returning the first success or the
    /// last error once attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, PortalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PortalError>>,
    {
        let attempts = if self.idempotent {
            self.attempts.max(1)
        } else {
            1
        };

        let mut last_err = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                sleep(self.delay).await;
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    debug!(attempt, attempts, error = %e, "portal call failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| PortalError::Decode("no attempts made".to_string())))
    }
}
