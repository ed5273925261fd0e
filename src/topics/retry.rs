// One-shot retry for "temporarily unavailable" provider responses.
//
// Both remote providers get exactly one extra try when the service reports
// that it is overloaded, after a fixed delay. Everything else fails fast and
// is left to the orchestrator's cascade.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::error::ProviderError;

/// Run `operation`, retrying it once after `delay` if the first attempt
/// fails with a temporarily-unavailable error.
pub async fn with_unavailable_retry<F, Fut, T>(
    delay: Duration,
    operation: F,
) -> Result<T, ProviderError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    match operation().await {
        Ok(value) => Ok(value),
        Err(err) if err.is_temporarily_unavailable() => {
            warn!(
                provider = err.provider(),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Provider unavailable, retrying once"
            );
            tokio::time::sleep(delay).await;
            operation().await
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn unavailable() -> ProviderError {
        ProviderError::Unavailable {
            provider: "test",
            status: 503,
        }
    }

    #[tokio::test]
    async fn test_success_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result = with_unavailable_retry(Duration::from_millis(10), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ProviderError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unavailable_retried_once_after_delay() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result = with_unavailable_retry(Duration::from_millis(40), || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(unavailable())
            } else {
                Ok("recovered")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_millis(35));
    }

    #[tokio::test]
    async fn test_retry_happens_only_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_unavailable_retry(Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(unavailable())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_fails_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_unavailable_retry(Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Auth {
                provider: "test",
                status: 401,
            })
        })
        .await;
        assert!(result.unwrap_err().is_auth());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
