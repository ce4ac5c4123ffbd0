use std::time::Duration;

/// Timing knobs for the synchronization layer
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use storesync::SyncConfig;
///
/// let config = SyncConfig::new()
///     .freshness_window(Duration::from_secs(10))
///     .debounce_window(Duration::from_millis(250));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// How long a fetched collection may be served without refetching
    pub freshness_window: Duration,

    /// Quiet period before a burst of debounced edits is sent
    pub debounce_window: Duration,

    /// Lifetime of success notifications
    pub success_ttl: Duration,

    /// Lifetime of error notifications
    pub error_ttl: Duration,

    /// Entries kept in per-key response caches (e.g. order details)
    pub cache_capacity: usize,
}

impl SyncConfig {
    pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(30);
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
    pub const DEFAULT_SUCCESS_TTL: Duration = Duration::from_millis(3000);
    pub const DEFAULT_ERROR_TTL: Duration = Duration::from_millis(5000);
    pub const DEFAULT_CACHE_CAPACITY: usize = 128;

    pub fn new() -> Self {
        Self {
            freshness_window: Self::DEFAULT_FRESHNESS,
            debounce_window: Self::DEFAULT_DEBOUNCE,
            success_ttl: Self::DEFAULT_SUCCESS_TTL,
            error_ttl: Self::DEFAULT_ERROR_TTL,
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn success_ttl(mut self, ttl: Duration) -> Self {
        self.success_ttl = ttl;
        self
    }

    pub fn error_ttl(mut self, ttl: Duration) -> Self {
        self.error_ttl = ttl;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.debounce_window.is_zero() {
            return Err("Debounce window must be greater than 0".to_string());
        }

        if self.success_ttl.is_zero() || self.error_ttl.is_zero() {
            return Err("Notification lifetimes must be greater than 0".to_string());
        }

        if self.cache_capacity == 0 {
            return Err("Cache capacity must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.freshness_window, Duration::from_secs(30));
        assert_eq!(config.debounce_window, Duration::from_millis(500));
        assert_eq!(config.success_ttl, Duration::from_millis(3000));
        assert_eq!(config.error_ttl, Duration::from_millis(5000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_freshness_is_allowed() {
        let config = SyncConfig::new().freshness_window(Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(SyncConfig::new().debounce_window(Duration::ZERO).validate().is_err());
        assert!(SyncConfig::new().error_ttl(Duration::ZERO).validate().is_err());
        assert!(SyncConfig::new().cache_capacity(0).validate().is_err());
    }
}
