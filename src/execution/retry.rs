use crate::Result;
use std::future::Future;
use tokio::time::{sleep, Duration};

/// How persistently a remote call is retried
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first call included
    pub max_attempts: u32,
    /// Fixed pause between attempts (no backoff)
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// What a retried call produced
///
/// Exhaustion is data, not an error: a call that never succeeded comes back
/// as `result: None` with the attempts spent, and the caller carries on.
/// `succeeded()` is derived from the payload, so the two can never disagree.
#[derive(Debug, Clone)]
pub struct CallOutcome<T> {
    pub result: Option<T>,
    pub attempts: u32,
}

impl<T> CallOutcome<T> {
    pub fn succeeded(&self) -> bool {
        self.result.is_some()
    }
}

/// Default failure predicate: every error is worth another attempt
///
/// The exchange adapter maps transport faults and exchange-envelope errors
/// to `Err` alike, so under this predicate both retry identically. Callers
/// that need to fail fast on permanent rejections pass their own predicate.
pub fn retry_all_errors<T>(outcome: &Result<T>) -> bool {
    outcome.is_err()
}

/// Drive `operation` until it succeeds, the predicate rules the failure
/// non-retryable, or the attempt budget is spent
///
/// Each failed attempt is logged at WARN and followed by the fixed policy
/// delay; exhaustion is logged once at ERROR. A failure the predicate
/// declines to retry returns immediately with no payload.
pub async fn invoke_with_retry<T, F, Fut, P>(
    label: &str,
    policy: &RetryPolicy,
    is_failure: P,
    mut operation: F,
) -> CallOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Result<T>) -> bool,
{
    for attempt in 1..=policy.max_attempts {
        let result = operation().await;

        if is_failure(&result) {
            match &result {
                Err(e) => tracing::warn!(
                    "{}: attempt {}/{} failed: {}",
                    label,
                    attempt,
                    policy.max_attempts,
                    e
                ),
                Ok(_) => tracing::warn!(
                    "{}: attempt {}/{} rejected by failure predicate",
                    label,
                    attempt,
                    policy.max_attempts
                ),
            }

            if attempt < policy.max_attempts {
                sleep(policy.delay).await;
            }
            continue;
        }

        return match result {
            Ok(value) => CallOutcome {
                result: Some(value),
                attempts: attempt,
            },
            Err(e) => {
                tracing::error!(
                    "{}: not retryable, giving up after attempt {}: {}",
                    label,
                    attempt,
                    e
                );
                CallOutcome {
                    result: None,
                    attempts: attempt,
                }
            }
        };
    }

    tracing::error!(
        "{}: all {} attempts failed, giving up",
        label,
        policy.max_attempts
    );
    CallOutcome {
        result: None,
        attempts: policy.max_attempts,
    }
}
