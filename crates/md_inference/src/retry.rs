use md_core::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded retry with exponential backoff for transient provider failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is exhausted. Backoff doubles between attempts.
    pub async fn run<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt >= self.attempts || !e.is_retryable() {
                        return Err(e);
                    }
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        what, attempt, self.attempts, backoff, e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use md_core::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_failures_up_to_budget() {
        let policy = RetryPolicy {
            attempts: 3,
            initial_backoff: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy
            .run("test call", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::Generation("rate limited".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let policy = RetryPolicy {
            attempts: 3,
            initial_backoff: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);
        let result = policy
            .run("test call", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(Error::Embedding("transient".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn store_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy
            .run("test call", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::Store("disk full".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
