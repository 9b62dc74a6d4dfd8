use std::future::Future;
use std::time::Duration;

use crate::error::ProviderError;

/// Run a provider call under `timeout`, retrying once if the first attempt
/// fails transiently. A timeout counts as a transient failure.
pub async fn retry_once<T, F, Fut>(
    operation: &str,
    timeout: Duration,
    mut call: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    match with_timeout(timeout, call()).await {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            tracing::warn!(operation, error = %e, "provider call failed, retrying once");
            with_timeout(timeout, call()).await.inspect_err(|e| {
                tracing::warn!(operation, error = %e, "provider call failed after retry");
            })
        }
        Err(e) => Err(e),
    }
}

async fn with_timeout<T, Fut>(timeout: Duration, fut: Fut) -> Result<T, ProviderError>
where
    Fut: Future<Output = Result<T, ProviderError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(ProviderError::Timeout(timeout)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LIMIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn first_success_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result = retry_once("op", LIMIT, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ProviderError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let calls = AtomicUsize::new(0);
        let result = retry_once("op", LIMIT, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProviderError::Transport("connection reset".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_failure_is_returned() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = retry_once("op", LIMIT, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Status {
                status: 502,
                body: "bad gateway".into(),
            })
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Status { status: 502, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = retry_once("op", LIMIT, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Malformed("not json".into()))
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Malformed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_call_times_out_twice() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = retry_once("op", LIMIT, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Timeout(d)) if d == LIMIT));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
