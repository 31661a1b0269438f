//! Deadline enforcement for layer calls and health probes.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Race `future` against `limit`.
///
/// The timeout always fires, even if `future` never settles; on expiry the
/// future is dropped and [`Error::Timeout`] names `operation`.
pub async fn with_timeout<F, T>(limit: Duration, operation: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation, limit.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pending_future_times_out() {
        let err = with_timeout(Duration::from_millis(50), "layer 'api'", async {
            futures::future::pending::<Result<()>>().await
        })
        .await
        .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "layer 'api' timed out after 50 ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_error_passes_through() {
        let err = with_timeout(Duration::from_secs(1), "probe", async {
            Err::<(), _>(Error::handler("refused"))
        })
        .await
        .unwrap_err();
        assert!(!err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_future_wins() {
        let value = with_timeout(Duration::from_secs(1), "probe", async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(value, 3);
    }
}
