//! Bounded retry with backoff and cancellation

use super::{AdapterError, SystemAdapter, SystemRequest, SystemResponse};
use ratewire_core::ast::RetryPolicy;
use tokio_util::sync::CancellationToken;

/// Final result of a retried call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    /// Attempts actually started
    pub attempts: u32,
    pub result: Result<SystemResponse, AdapterError>,
}

/// Call `adapter` until it succeeds, fails permanently, exhausts the policy
/// or `cancel` fires.
///
/// Each attempt is bounded by `request.timeout`. Cancellation aborts the
/// attempt in flight as well as any pending backoff.
pub async fn call_with_retry(
    adapter: &dyn SystemAdapter,
    request: &SystemRequest,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> RetryOutcome {
    let mut attempts = 0;

    loop {
        if cancel.is_cancelled() {
            return RetryOutcome {
                attempts,
                result: Err(AdapterError::Cancelled),
            };
        }
        attempts += 1;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AdapterError::Cancelled),
            outcome = tokio::time::timeout(request.timeout, adapter.call(request)) => {
                outcome.unwrap_or(Err(AdapterError::Timeout(request.timeout)))
            }
        };

        let error = match result {
            Ok(response) => {
                return RetryOutcome {
                    attempts,
                    result: Ok(response),
                }
            }
            Err(e) => e,
        };

        if !error.is_retryable() || attempts > policy.max_retries {
            if error.is_retryable() {
                tracing::error!(
                    system = %request.system,
                    attempts,
                    error = %error,
                    "External call failed after all retries"
                );
            }
            return RetryOutcome {
                attempts,
                result: Err(error),
            };
        }

        let delay = policy.delay_for(attempts);
        tracing::warn!(
            system = %request.system,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "External call failed, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return RetryOutcome {
                    attempts,
                    result: Err(AdapterError::Cancelled),
                };
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
