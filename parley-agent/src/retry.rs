// ABOUTME: Retry policy and a generic async retry combinator for backend calls.
// ABOUTME: Every language-model call site shares this instead of hand-written sleep loops.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

/// How many times to try an operation and how long to wait in between.
///
/// The wait before attempt `n + 1` is `initial_delay * multiplier^(n - 1)`,
/// so an exponential policy with a one second base waits 1s, 2s, 4s, ...
/// and a fixed policy (multiplier 1) waits the same delay every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    /// Doubling backoff starting at `initial_delay`
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier: 2,
        }
    }

    /// Constant pause between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: delay,
            multiplier: 1,
        }
    }

    /// No waiting at all; used by tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Same timing, different attempt cap
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self
        }
    }

    /// Same cap and base delay, but constant instead of growing
    pub fn as_fixed(self) -> Self {
        Self {
            multiplier: 1,
            ..self
        }
    }

    /// Delay to wait after the failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_secs(1))
    }
}

/// Run `op` until it succeeds or the policy's attempt cap is reached.
///
/// `op` receives the 1-based attempt number. The last error is returned
/// when every attempt failed. There is no wait after the final attempt.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.max_attempts => {
                tracing::warn!(
                    operation,
                    attempts = attempt,
                    error = %e,
                    "Giving up after final attempt"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_delays_double() {
        let policy = RetryPolicy::exponential(3, Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }

    #[test]
    fn test_fixed_delays_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(500));
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(3), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_attempts_becomes_one() {
        assert_eq!(RetryPolicy::exponential(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::immediate(3).with_max_attempts(0).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = retry(&RetryPolicy::immediate(3), "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    anyhow::bail!("boom")
                }
                Ok(attempt)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_stops_at_cap() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry(&RetryPolicy::immediate(3), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { anyhow::bail!("always fails") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_between_attempts() {
        let start = tokio::time::Instant::now();
        let policy = RetryPolicy::exponential(3, Duration::from_secs(1));
        let _: Result<()> = retry(&policy, "test", |_| async { anyhow::bail!("nope") }).await;
        // 1s after the first failure, 2s after the second, nothing after the last
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
