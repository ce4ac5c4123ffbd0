use std::time::Duration;

/// Retry schedule for the resilient fetch client.
///
/// `max_attempts` counts the first try, so `max_attempts = 3` allows at most
/// two retries. Delay before retry `i` (0-based) is `base_delay_ms * 2^i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
        }
    }

    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self::new(1, 0)
    }

    /// Attempts actually performed, never below one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Backoff to wait after the failed attempt with index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Whether another attempt is allowed after `attempt` (0-based) failed.
    pub fn has_attempt_after(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.attempts()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be >= 1".to_string());
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_BASE_DELAY_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::new(3, 1000);
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[test]
    fn test_attempt_bound() {
        let policy = RetryPolicy::new(3, 10);
        assert!(policy.has_attempt_after(0));
        assert!(policy.has_attempt_after(1));
        assert!(!policy.has_attempt_after(2));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let policy = RetryPolicy::new(0, 10);
        assert_eq!(policy.attempts(), 1);
        assert!(!policy.has_attempt_after(0));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::new(100, u64::MAX / 2);
        assert_eq!(policy.delay_for(90), Duration::from_millis(u64::MAX));
    }
}
