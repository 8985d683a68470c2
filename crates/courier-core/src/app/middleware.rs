//! Wrappers composed around outbound management calls.
//!
//! Retry count and backoff are explicit parameters; nothing is captured from
//! module state.

use std::future::Future;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::Result;
use crate::queue::BackoffPolicy;

/// Run `call` up to `attempts` times, sleeping `backoff.delay(n)` after the
/// n-th failure. Configuration errors are returned immediately.
pub async fn with_retry<T, F, Fut>(
    operation: &str,
    attempts: u32,
    backoff: &BackoffPolicy,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_configuration() || attempt >= attempts => return Err(e),
            Err(e) => {
                let delay = backoff.delay(attempt);
                warn!(
                    operation,
                    attempt,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "call failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Log the outcome and duration of `fut`.
pub async fn logged<T, Fut>(operation: &str, subject: &str, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let result = fut.await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => debug!(operation, subject, elapsed_ms, "call succeeded"),
        Err(e) => warn!(operation, subject, elapsed_ms, error = %e, "call failed"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CourierError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn tiny_backoff() -> BackoffPolicy {
        BackoffPolicy::new(2.0, Duration::from_millis(1), Duration::from_millis(4)).unwrap()
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let value = with_retry("create", 3, &tiny_backoff(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CourierError::queue_admin("create", "q", "503"))
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let err = with_retry("create", 2, &tiny_backoff(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(CourierError::queue_admin("create", "q", "503"))
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("503"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn configuration_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry("create", 5, &tiny_backoff(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(CourierError::configuration("bad project"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn logged_passes_result_through() {
        let ok = logged("exists", "q", async { Ok::<_, CourierError>(true) }).await;
        assert!(ok.unwrap());
    }
}
