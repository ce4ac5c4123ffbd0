use std::time::Duration;
use tokio::time::Instant;

/// A value together with the moment it was fetched.
///
/// A cached value may stand in for a network read only while
/// `now - fetched_at < window`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T) -> Self {
        Self::at(value, Instant::now())
    }

    pub fn at(value: T, fetched_at: Instant) -> Self {
        Self { value, fetched_at }
    }

    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.fetched_at)
    }

    pub fn is_fresh(&self, window: Duration) -> bool {
        self.is_fresh_at(Instant::now(), window)
    }

    pub fn is_fresh_at(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.fetched_at) < window
    }

    /// Mark the value as just confirmed by the server.
    pub fn touch(&mut self) {
        self.fetched_at = Instant::now();
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheEntry<U> {
        CacheEntry {
            value: f(self.value),
            fetched_at: self.fetched_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_freshness_window_is_exclusive() {
        let entry = CacheEntry::new(vec![1, 2, 3]);
        let window = Duration::from_secs(30);
        assert!(entry.is_fresh(window));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(entry.is_fresh(window));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!entry.is_fresh(window));
        assert_eq!(entry.age(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_restarts_window() {
        let mut entry = CacheEntry::new("cart");
        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(!entry.is_fresh(Duration::from_secs(30)));

        entry.touch();
        assert!(entry.is_fresh(Duration::from_secs(30)));
    }
}
