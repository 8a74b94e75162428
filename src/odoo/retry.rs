//! Retry policy for XML-RPC calls

use crate::config::ConnectionSettings;
use std::time::Duration;

/// Linear backoff: the wait before retry `n` is `base_delay * n`.
///
/// The schedule depends only on the settings, so it is identical across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// First attempt plus `max_retries` retries
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the `retry`-th retry (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(retry)
    }

    /// Whether another attempt is allowed after `attempt` attempts have failed
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }
}

impl From<ConnectionSettings> for RetryPolicy {
    fn from(settings: ConnectionSettings) -> Self {
        Self::new(settings.max_retries, settings.retry_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_schedule() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1500));
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));

        let no_retries = RetryPolicy::new(0, Duration::ZERO);
        assert!(!no_retries.should_retry(1));
    }
}
