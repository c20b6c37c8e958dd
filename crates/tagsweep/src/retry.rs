//! Bounded retry of mutating API calls
//!
//! Every mutating call goes through [`with_retry`]. An outcome whose status is
//! in the accepted set returns immediately; anything else is retried after a
//! constant delay until the attempt budget runs out, and the last failing
//! outcome is returned instead of an error.

use backon::{ConstantBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tagsweep_common::ApiOutcome;
use tagsweep_common::defaults::{DEFAULT_MAX_ATTEMPTS, default_retry_delay};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Attempt budget and delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: default_retry_delay(),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// Run `call` until it returns an accepted outcome or the policy is exhausted.
///
/// Cancellation is checked between attempts, never during one: an in-flight
/// call always completes and its outcome is returned.
pub async fn with_retry<F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    mut call: F,
) -> ApiOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiOutcome>,
{
    let result = (|| {
        let attempt = call();
        async move {
            let outcome = attempt.await;
            if outcome.is_accepted() {
                Ok(outcome)
            } else {
                Err(outcome)
            }
        }
    })
    .retry(policy.backoff())
    .when(|_| {
        let cancelled = cancel.is_cancelled();
        if cancelled {
            debug!(operation = %operation, "Cancelled, not retrying");
        }
        !cancelled
    })
    .notify(|outcome: &ApiOutcome, dur: Duration| {
        warn!(
            operation = %operation,
            status = outcome.status,
            error = ?outcome.error,
            delay = ?dur,
            "Call not accepted, retrying..."
        );
    })
    .await;

    result.unwrap_or_else(|outcome| outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tagsweep_common::ApiErrorDetail;
    use tokio::time::Instant;

    fn throttled() -> ApiOutcome {
        ApiOutcome::failed(400, ApiErrorDetail::new("Throttling", "Rate exceeded"))
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_outcome_returns_after_one_call() {
        let calls = AtomicU32::new(0);
        let outcome = with_retry(&RetryPolicy::default(), &CancellationToken::new(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { ApiOutcome::with_status(204) }
        })
        .await;

        assert_eq!(outcome.status, 204);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_makes_exactly_three_attempts() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let outcome = with_retry(&RetryPolicy::default(), &CancellationToken::new(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { throttled() }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome, throttled());
        // Two sleeps of the default delay between three attempts
        assert!(start.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_later_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome = with_retry(&RetryPolicy::default(), &CancellationToken::new(), "op", move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    ApiOutcome::with_status(500)
                } else {
                    ApiOutcome::with_status(202)
                }
            }
        })
        .await;

        assert!(outcome.is_accepted());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_between_attempts() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let outcome = with_retry(&RetryPolicy::default(), &cancel, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
            async { throttled() }
        })
        .await;

        assert!(!outcome.is_accepted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_budget_is_honoured() {
        let policy = RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_millis(10),
        };
        let calls = AtomicU32::new(0);

        with_retry(&policy, &CancellationToken::new(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { ApiOutcome::with_status(0) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let single = RetryPolicy {
            max_attempts: 0,
            delay: Duration::from_millis(10),
        };
        calls.store(0, Ordering::SeqCst);
        with_retry(&single, &CancellationToken::new(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { ApiOutcome::with_status(0) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
