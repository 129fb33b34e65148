//! Retry policy for establishing database connections.
//!
//! The default policy retries forever with a constant 5 second delay, which
//! fits the "database container not up yet" startup case.

use std::time::Duration;

/// Default delay between connection attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default upper bound on a single connection attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay schedule between successive attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Constant(Duration),
    /// Doubling delay starting at `initial`, capped at `max`
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Constant(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let shift = attempt.saturating_sub(1).min(31);
                initial
                    .checked_mul(1u32 << shift)
                    .map_or(max, |delay| delay.min(max))
            }
        }
    }
}

/// When to give up and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, `None` for unlimited
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Retry forever with the same delay every time.
    pub fn unlimited(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            backoff: Backoff::Constant(delay),
        }
    }

    /// Give up after `max_attempts` total attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Whether another attempt may follow `attempts_made` failed attempts.
    pub fn allows_retry(&self, attempts_made: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts_made < max)
    }

    /// Delay before the retry that follows failed attempt `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unlimited(DEFAULT_RETRY_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_unlimited_constant_five_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, None);
        assert!(policy.allows_retry(u32::MAX));
        for attempt in [1, 2, 10, 1_000] {
            assert_eq!(policy.delay(attempt), Duration::from_secs(5));
        }
    }

    #[test]
    fn max_attempts_stops_retrying() {
        let policy = RetryPolicy::unlimited(Duration::from_secs(1)).with_max_attempts(3);
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
        };
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(4), Duration::from_secs(8));
        assert_eq!(backoff.delay(5), Duration::from_secs(10));
        // Large attempt counts must not overflow
        assert_eq!(backoff.delay(200), Duration::from_secs(10));
    }
}
