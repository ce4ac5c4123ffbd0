use super::entry::CacheEntry;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Keyed, size-bounded cache of fetched values.
///
/// Least recently used keys are evicted once `capacity` is reached.
pub struct ResponseCache<T> {
    entries: Mutex<LruCache<String, CacheEntry<T>>>,
    window: Duration,
}

impl<T: Clone> ResponseCache<T> {
    pub fn new(capacity: usize, window: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Cached value if still inside the freshness window.
    pub fn get_fresh(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        if entry.is_fresh(self.window) {
            debug!(key, "response cache hit");
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Cached entry regardless of age.
    pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: T) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key.into(), CacheEntry::new(value));
        }
    }

    /// Modify a cached value in place, keeping its fetch time.
    /// Returns the previous value when the key was present.
    pub fn update<F>(&self, key: &str, f: F) -> Option<T>
    where
        F: FnOnce(&mut T),
    {
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.get_mut(key)?;
        let previous = entry.value.clone();
        f(&mut entry.value);
        Some(previous)
    }

    /// Put back a value without refreshing its fetch time.
    pub fn restore(&self, key: &str, value: T) {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(entry) = entries.get_mut(key) {
                entry.value = value;
            }
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
