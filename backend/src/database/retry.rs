use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::AppResult;

/// Base delay between attempts; doubles each retry
const BASE_DELAY_MS: u64 = 20;
const MAX_DELAY_MS: u64 = 500;

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` attempts have been made. The last error is returned
/// unchanged when the budget runs out.
pub async fn with_retry<F, Fut, T>(max_attempts: u32, mut operation: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Transaction conflict, retrying"
                );

                let delay_ms = (BASE_DELAY_MS * 2_u64.pow(attempt - 1)).min(MAX_DELAY_MS);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
