//! Fetch retry policy
//!
//! Only errors known to be flaky are retried, with a fixed delay between
//! attempts. Everything else fails on the first attempt.

use crate::progress::{ProgressEvent, ProgressHandler};
use std::future::Future;
use std::time::Duration;

/// Error fragments that mark a fetch failure as transient
pub const TRANSIENT_FETCH_ERRORS: &[&str] = &[
    "Unknown SSL protocol error in connection",
    "The requested URL returned error: 403 while accessing",
    "fatal: HTTP request failed",
    "fatal: The remote end hung up unexpectedly",
];

pub fn is_transient(message: &str) -> bool {
    TRANSIENT_FETCH_ERRORS.iter().any(|fragment| message.contains(fragment))
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Runs `operation` until it succeeds, fails permanently, or attempts run out
    pub async fn run<T, F, Fut>(&self, progress: &dyn ProgressHandler, mut operation: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 1;
        loop {
            progress.on_progress(&ProgressEvent::FetchAttempt {
                attempt,
                max_attempts: self.attempts,
            });

            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let message = format!("{:#}", e);
                    if attempt >= self.attempts || !is_transient(&message) {
                        return Err(e);
                    }
                    progress.on_progress(&ProgressEvent::FetchRetry {
                        attempt,
                        error: message,
                        delay: self.delay,
                    });
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CollectingHandler;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn test_transient_fragments() {
        assert!(is_transient("error: fatal: HTTP request failed\n"));
        assert!(is_transient("fatal: The remote end hung up unexpectedly"));
        assert!(!is_transient("fatal: repository not found"));
    }

    #[tokio::test]
    async fn test_transient_error_is_retried_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let handler = CollectingHandler::new();

        let result = policy()
            .run(&handler, || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow!("fatal: HTTP request failed"))
                } else {
                    Ok("done")
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            handler.count(|e| matches!(e, ProgressEvent::FetchRetry { .. })),
            2
        );
    }

    #[tokio::test]
    async fn test_transient_error_gives_up_after_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: anyhow::Result<()> = policy()
            .run(&CollectingHandler::new(), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("fatal: The remote end hung up unexpectedly"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_fail_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: anyhow::Result<()> = policy()
            .run(&CollectingHandler::new(), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("fatal: couldn't find remote ref main"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
