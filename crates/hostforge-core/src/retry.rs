//! Bounded retry with fixed inter-attempt delay
//!
//! A `RetryPolicy` is a pure value; the attempt counter lives in the loop
//! that drives it. The same helper backs the SSH connect phase and the
//! update agent's swap loop, each with their own parameters.

use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Maximum attempts and fixed delay between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts (not retries), at least 1
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Default policy for SSH connection attempts against a booting host
    pub const CONNECT: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        delay: Duration::from_secs(3),
    };

    /// Default policy for the update agent's swap loop, sized to outlast
    /// the window in which the parent process is still exiting
    pub const AGENT_SWAP: RetryPolicy = RetryPolicy {
        max_attempts: 6,
        delay: Duration::from_secs(10),
    };

    /// Create a policy with explicit parameters
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Drive `action` until it succeeds or attempts are exhausted.
    ///
    /// Errors for which `retryable` returns false surface immediately.
    /// Returns the final result together with the number of attempts made.
    pub async fn run<T, E>(
        &self,
        mut action: impl AsyncFnMut() -> Result<T, E>,
        retryable: impl Fn(&E) -> bool,
    ) -> (Result<T, E>, u32)
    where
        E: std::fmt::Display,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match action().await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if attempt < max && retryable(&e) => {
                    warn!(
                        attempt,
                        max_attempts = max,
                        delay = ?self.delay,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    sleep(self.delay).await;
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn succeeds_first_attempt() {
        let policy = instant_policy(5);
        let (result, attempts) = policy
            .run(async || Ok::<_, String>(42), |_| true)
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn succeeds_on_nth_attempt_and_reports_n() {
        let policy = instant_policy(5);
        let calls = AtomicU32::new(0);

        let (result, attempts) = policy
            .run(
                async || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 4 {
                        Err("connection refused".to_string())
                    } else {
                        Ok("connected")
                    }
                },
                |_| true,
            )
            .await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(attempts, 4);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let policy = instant_policy(3);
        let calls = AtomicU32::new(0);

        let (result, attempts) = policy
            .run(
                async || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("still booting".to_string())
                },
                |_| true,
            )
            .await;

        assert_eq!(result.unwrap_err(), "still booting");
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let policy = instant_policy(5);
        let calls = AtomicU32::new(0);

        let (result, attempts) = policy
            .run(
                async || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("passphrase required".to_string())
                },
                |e| !e.contains("passphrase"),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
