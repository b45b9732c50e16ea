//! Retry policy for transient sync failures

use std::time::Duration;

use sitesync_core::config::SyncConfig;

use crate::SyncErrorKind;

/// Bounded linear backoff
///
/// Attempt `n` (1-based) that failed with a retryable kind is followed by
/// a wait of `base_delay * n`, as long as fewer than `max_attempts`
/// attempts have been made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delay())
    }

    /// Whether another attempt should follow failed attempt number `attempt`
    pub fn should_retry(&self, attempt: u32, kind: SyncErrorKind) -> bool {
        kind.is_retryable() && attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
    }

    #[test]
    fn retries_stop_at_max_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1, SyncErrorKind::Network));
        assert!(policy.should_retry(2, SyncErrorKind::Timeout));
        assert!(!policy.should_retry(3, SyncErrorKind::Network));
    }

    #[test]
    fn non_transient_kinds_are_not_retried() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(1, SyncErrorKind::Server));
        assert!(!policy.should_retry(1, SyncErrorKind::Authentication));
        assert!(!policy.should_retry(1, SyncErrorKind::Client));
    }

    #[test]
    fn zero_attempts_still_allows_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.should_retry(1, SyncErrorKind::Network));
    }
}
