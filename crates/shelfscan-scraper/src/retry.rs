//! Retry with exponential back-off and jitter for page fetches.
//!
//! Network failures, HTTP 429 and 5xx responses are retried. Block pages,
//! other statuses and snapshot read failures are returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

pub(crate) fn is_retriable(err: &FetchError) -> bool {
    match err {
        FetchError::Network { .. } => true,
        FetchError::UnexpectedStatus { status, .. } => *status == 429 || *status >= 500,
        FetchError::Client(_)
        | FetchError::Timeout { .. }
        | FetchError::Blocked { .. }
        | FetchError::Snapshot { .. }
        | FetchError::InvalidTarget { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// The n-th retry waits `backoff_base_ms * 2^(n-1)` ms ± 25 % jitter, capped
/// at 30 s. Callers bound the whole loop with their own timeout.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    const MAX_DELAY_MS: u64 = 30_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient fetch error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
