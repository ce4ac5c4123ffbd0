// ============================================================================
// Notifications
// ============================================================================
//
// Transient user-facing messages. Each entry carries its own lifetime and
// expired entries are pruned whenever the queue is read or appended to, so
// no timer task is needed.
//
// ============================================================================

use super::config::SyncConfig;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl Notification {
    pub fn is_active_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

struct NotifierInner {
    entries: Mutex<VecDeque<Notification>>,
    next_id: AtomicU64,
    success_ttl: Duration,
    error_ttl: Duration,
}

/// Shared queue of transient notifications
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

impl Notifier {
    pub fn new(config: &SyncConfig) -> Self {
        Self::with_ttls(config.success_ttl, config.error_ttl)
    }

    pub fn with_ttls(success_ttl: Duration, error_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                entries: Mutex::new(VecDeque::new()),
                next_id: AtomicU64::new(1),
                success_ttl,
                error_ttl,
            }),
        }
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Error, message)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Info, message)
    }

    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) -> u64 {
        let ttl = match level {
            NotificationLevel::Error => self.inner.error_ttl,
            NotificationLevel::Success | NotificationLevel::Info => self.inner.success_ttl,
        };
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let notification = Notification {
            id,
            level,
            message: message.into(),
            created_at: now,
            ttl,
        };
        log::debug!("notification {} ({:?}): {}", id, level, notification.message);
        let mut entries = self.entries();
        entries.retain(|n| n.is_active_at(now));
        entries.push_back(notification);
        id
    }

    /// Notifications still within their lifetime, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        let now = Instant::now();
        let mut entries = self.entries();
        entries.retain(|n| n.is_active_at(now));
        entries.iter().cloned().collect()
    }

    pub fn latest(&self, level: NotificationLevel) -> Option<Notification> {
        self.active().into_iter().rev().find(|n| n.level == level)
    }

    pub fn dismiss(&self, id: u64) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|n| n.id != id);
        entries.len() != before
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_error_outlives_success() {
        let notifier = Notifier::default();
        notifier.success("Added to cart");
        notifier.error("Server error - please try again later");
        assert_eq!(notifier.active().len(), 2);

        tokio::time::advance(Duration::from_millis(3000)).await;
        let active = notifier.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].level, NotificationLevel::Error);

        tokio::time::advance(Duration::from_millis(2000)).await;
        assert!(notifier.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_prunes_expired_entries() {
        let notifier = Notifier::default();
        for n in 0..50 {
            notifier.success(format!("saved {}", n));
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        // Only the last three are younger than the 3 s success lifetime.
        assert_eq!(notifier.entries().len(), 3);
        assert_eq!(notifier.active().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss() {
        let notifier = Notifier::default();
        let id = notifier.info("hello");
        assert!(notifier.dismiss(id));
        assert!(!notifier.dismiss(id));
        assert!(notifier.latest(NotificationLevel::Info).is_none());
    }
}
