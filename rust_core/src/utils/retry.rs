//! Retry logic for transient marketplace failures
//!
//! Retries with exponential backoff when a request timed out, could not
//! connect, or the marketplace answered 429 / 5xx.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff schedule for [`fetch_with_retry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 250,
            max_backoff_ms: 4_000,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let ms = self
            .base_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)))
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Run `f` until it succeeds, fails permanently, or attempts run out.
///
/// # Example
/// ```ignore
/// let sales = fetch_with_retry(
///     || async { client.get(&url).send().await?.error_for_status()?.json().await.map_err(Into::into) },
///     RetryPolicy::default(),
///     "latest sales",
/// ).await?;
/// ```
pub async fn fetch_with_retry<F, Fut, T>(mut f: F, policy: RetryPolicy, what: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < policy.max_attempts && is_retriable_error(&e) => {
                let backoff = policy.backoff(attempt);
                warn!(
                    "Fetching {} failed (attempt {}/{}): {}. Retrying in {}ms",
                    what,
                    attempt,
                    policy.max_attempts,
                    e,
                    backoff.as_millis()
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Check if a fetch error is likely transient
pub fn is_retriable_error(e: &anyhow::Error) -> bool {
    for cause in e.chain() {
        if let Some(req) = cause.downcast_ref::<reqwest::Error>() {
            if req.is_timeout() || req.is_connect() {
                return true;
            }
            if let Some(status) = req.status() {
                return status.as_u16() == 429 || status.is_server_error();
            }
        }
    }

    let err_str = e.to_string().to_lowercase();
    err_str.contains("timeout")
        || err_str.contains("timed out")
        || err_str.contains("connection reset")
        || err_str.contains("connection refused")
        || err_str.contains("connection closed")
        || err_str.contains("broken pipe")
        || err_str.contains("too many requests")
        || err_str.contains("429")
        || err_str.contains("502")
        || err_str.contains("503")
        || err_str.contains("504")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[test]
    fn test_is_retriable_error() {
        assert!(is_retriable_error(&anyhow::anyhow!("operation timed out")));
        assert!(is_retriable_error(&anyhow::anyhow!("connection refused")));
        assert!(is_retriable_error(&anyhow::anyhow!("Marketplace API error: 503 Service Unavailable")));
        assert!(is_retriable_error(&anyhow::anyhow!("429 Too Many Requests")));

        assert!(!is_retriable_error(&anyhow::anyhow!("Marketplace API error: 404 Not Found")));
        assert!(!is_retriable_error(&anyhow::anyhow!("invalid json")));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_backoff_ms: 100,
            max_backoff_ms: 500,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(8), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: anyhow::Result<i32> = fetch_with_retry(
            || {
                let count = attempt_count_clone.clone();
                async move {
                    let current = count.fetch_add(1, Ordering::SeqCst) + 1;
                    if current < 3 {
                        Err(anyhow::anyhow!("connection reset by peer"))
                    } else {
                        Ok(42)
                    }
                }
            },
            fast_policy(),
            "test",
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_permanent_error() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: anyhow::Result<i32> = fetch_with_retry(
            || {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("product not found"))
                }
            },
            fast_policy(),
            "test",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: anyhow::Result<i32> = fetch_with_retry(
            || {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("request timed out"))
                }
            },
            fast_policy(),
            "test",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }
}
