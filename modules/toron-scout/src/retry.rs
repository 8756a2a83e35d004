use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tracing::warn;

use crate::traits::ForumPage;

/// Whether a successful response actually carried anything.
pub trait Payload {
    fn has_data(&self) -> bool;
}

impl<T> Payload for Vec<T> {
    fn has_data(&self) -> bool {
        !self.is_empty()
    }
}

impl Payload for ForumPage {
    fn has_data(&self) -> bool {
        !self.posts.is_empty()
    }
}

/// Fixed-count retry with exponential backoff (base, 3x base, ...) plus up
/// to half the base in random jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Backoff before retry `attempt + 1`, without jitter. Saturates for
    /// large attempt counts.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(3u32.saturating_pow(attempt))
    }

    async fn pause(&self, attempt: u32) {
        let jitter_cap = (self.backoff.as_millis() / 2) as u64;
        let jitter = Duration::from_millis(rand::rng().random_range(0..=jitter_cap));
        let wait = self.backoff_for(attempt).saturating_add(jitter);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Errors and empty responses both count as failed attempts. `None` once
    /// every attempt has failed; callers end their paging loop there.
    pub async fn fetch<T, F, Fut>(&self, what: &str, mut call: F) -> Option<T>
    where
        T: Payload,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        for attempt in 0..self.attempts {
            match call().await {
                Ok(value) if value.has_data() => return Some(value),
                Ok(_) => warn!(what, attempt = attempt + 1, "Remote call returned no data"),
                Err(e) => warn!(what, attempt = attempt + 1, error = %e, "Remote call failed"),
            }
            if attempt + 1 < self.attempts {
                self.pause(attempt).await;
            }
        }
        warn!(what, attempts = self.attempts, "Giving up after retries");
        None
    }

    /// Only errors are retried; the last error is returned once attempts run out.
    pub async fn call<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < self.attempts => {
                    warn!(what, attempt = attempt + 1, error = %e, "Remote call failed, retrying");
                    self.pause(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.context(format!("{what} failed after {} attempts", self.attempts))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO)
    }

    #[tokio::test]
    async fn empty_responses_are_retried_then_abandoned() {
        let calls = AtomicU32::new(0);
        let result: Option<Vec<u32>> = policy()
            .fetch("empty", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            })
            .await;
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_after_transient_error() {
        let calls = AtomicU32::new(0);
        let result = policy()
            .fetch("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("connection reset");
                }
                Ok(vec![1])
            })
            .await;
        assert_eq!(result, Some(vec![1]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn call_accepts_empty_results() {
        let calls = AtomicU32::new(0);
        let result: Option<u32> = policy()
            .call("lookup", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .await
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_grows_threefold_and_saturates() {
        let policy = RetryPolicy::new(30, Duration::from_secs(1));
        assert_eq!(policy.backoff_for(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(9));
        assert_eq!(
            policy.backoff_for(25),
            Duration::from_secs(1).saturating_mul(u32::MAX)
        );
    }

    #[tokio::test]
    async fn call_surfaces_last_error() {
        let result: Result<u32> = policy()
            .call("down", || async { anyhow::bail!("503") })
            .await;
        assert!(result.is_err());
    }
}
