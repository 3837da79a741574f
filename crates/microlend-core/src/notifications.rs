//! Notification queue
//!
//! Bounded queue of transient UI notifications, newest first. Adding past
//! capacity discards the oldest entries for good. Eviction follows insertion
//! order only; read notifications are not evicted earlier.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{Reducer, Store, Subscription};

/// Default number of notifications kept
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Success => f.write_str("success"),
            NotificationKind::Error => f.write_str("error"),
            NotificationKind::Warning => f.write_str("warning"),
            NotificationKind::Info => f.write_str("info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Creation time in milliseconds, bumped to stay unique
    pub id: u64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Input to `add_notification`
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationState {
    /// Newest first
    pub items: Vec<Notification>,
    pub capacity: usize,
}

impl Default for NotificationState {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl NotificationState {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }
}

#[derive(Debug, Clone)]
pub enum NotificationPatch {
    /// Prepend, then evict beyond capacity
    Add(Notification),
    Remove(u64),
    MarkRead(u64),
    MarkAllRead,
    Clear,
}

impl Reducer for NotificationState {
    type Patch = NotificationPatch;

    fn apply(&mut self, patch: NotificationPatch) {
        match patch {
            NotificationPatch::Add(notification) => {
                self.items.insert(0, notification);
                self.items.truncate(self.capacity);
            }
            NotificationPatch::Remove(id) => self.items.retain(|n| n.id != id),
            NotificationPatch::MarkRead(id) => {
                if let Some(n) = self.items.iter_mut().find(|n| n.id == id) {
                    n.read = true;
                }
            }
            NotificationPatch::MarkAllRead => {
                for n in &mut self.items {
                    n.read = true;
                }
            }
            NotificationPatch::Clear => self.items.clear(),
        }
    }
}

/// Bounded, newest-first notification queue
pub struct NotificationStore {
    store: Store<NotificationState>,
    last_id: AtomicU64,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl NotificationStore {
    /// Queue keeping at most `capacity` notifications (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            store: Store::new(NotificationState::with_capacity(capacity)),
            last_id: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> NotificationState {
        self.store.snapshot()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription<NotificationState>
    where
        F: Fn(&NotificationState) + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn items(&self) -> Vec<Notification> {
        self.store.with(|state| state.items.clone())
    }

    pub fn unread_count(&self) -> usize {
        self.store.with(NotificationState::unread_count)
    }

    /// Queue a notification and return its id
    pub fn add_notification(&self, new: NewNotification) -> u64 {
        let now = Utc::now();
        let id = self.next_id(now);

        debug!(id, kind = %new.kind, title = %new.title, "Notification added");

        self.store.patch(NotificationPatch::Add(Notification {
            id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            created_at: now,
            read: false,
        }));
        id
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.add_notification(NewNotification::new(NotificationKind::Success, title, message))
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.add_notification(NewNotification::new(NotificationKind::Error, title, message))
    }

    pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.add_notification(NewNotification::new(NotificationKind::Warning, title, message))
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.add_notification(NewNotification::new(NotificationKind::Info, title, message))
    }

    /// No-op if absent
    pub fn remove_notification(&self, id: u64) {
        self.store.patch(NotificationPatch::Remove(id));
    }

    /// No-op if absent; does not reorder
    pub fn mark_notification_read(&self, id: u64) {
        self.store.patch(NotificationPatch::MarkRead(id));
    }

    pub fn mark_all_read(&self) {
        self.store.patch(NotificationPatch::MarkAllRead);
    }

    pub fn clear_notifications(&self) {
        self.store.patch(NotificationPatch::Clear);
    }

    /// Milliseconds since the epoch, or one past the previous id
    fn next_id(&self, now: DateTime<Utc>) -> u64 {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let previous = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(millis.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        millis.max(previous + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_n(store: &NotificationStore, n: usize) -> Vec<u64> {
        (1..=n)
            .map(|i| store.info(format!("N{}", i), "message"))
            .collect()
    }

    #[test]
    fn test_add_prepends_unread() {
        let store = NotificationStore::default();
        let first = store.success("Saved", "Payment recorded");
        let second = store.error("Failed", "Network down");

        let items = store.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, second);
        assert_eq!(items[1].id, first);
        assert_eq!(items[0].kind, NotificationKind::Error);
        assert!(items.iter().all(|n| !n.read));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let store = NotificationStore::default();
        let ids = add_n(&store, 20);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_fifty_two_adds_keep_newest_fifty() {
        let store = NotificationStore::default();
        add_n(&store, 52);

        let items = store.items();
        assert_eq!(items.len(), 50);
        assert_eq!(items[0].title, "N52");
        assert_eq!(items[49].title, "N3");
        assert!(!items.iter().any(|n| n.title == "N1" || n.title == "N2"));
    }

    #[test]
    fn test_capacity_never_exceeded_and_order_is_newest_first() {
        let store = NotificationStore::new(7);
        for total in 1..=30 {
            store.info(format!("N{}", total), "");
            let items = store.items();
            assert!(items.len() <= 7);

            let expected: Vec<String> = (1..=total)
                .rev()
                .take(7)
                .map(|i| format!("N{}", i))
                .collect();
            let titles: Vec<String> = items.iter().map(|n| n.title.clone()).collect();
            assert_eq!(titles, expected);
        }
    }

    #[test]
    fn test_read_state_does_not_affect_eviction() {
        let store = NotificationStore::new(3);
        let ids = add_n(&store, 3);
        store.mark_notification_read(ids[0]);

        store.info("N4", "");

        let titles: Vec<String> = store.items().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["N4", "N3", "N2"]);
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let store = NotificationStore::default();
        let ids = add_n(&store, 3);

        store.mark_notification_read(ids[1]);
        let once = store.snapshot();
        store.mark_notification_read(ids[1]);

        assert_eq!(store.snapshot(), once);
        assert_eq!(store.unread_count(), 2);
    }

    #[test]
    fn test_mark_read_does_not_reorder() {
        let store = NotificationStore::default();
        let ids = add_n(&store, 3);
        let before: Vec<u64> = store.items().iter().map(|n| n.id).collect();

        store.mark_notification_read(ids[0]);

        let after: Vec<u64> = store.items().iter().map(|n| n.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_absent_ids_are_noops() {
        let store = NotificationStore::default();
        add_n(&store, 2);
        let before = store.snapshot();

        store.remove_notification(12345);
        store.mark_notification_read(12345);

        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_remove_and_clear() {
        let store = NotificationStore::default();
        let ids = add_n(&store, 3);

        store.remove_notification(ids[1]);
        assert_eq!(store.items().len(), 2);
        assert!(store.items().iter().all(|n| n.id != ids[1]));

        store.clear_notifications();
        assert!(store.items().is_empty());
    }

    #[test]
    fn test_mark_all_read() {
        let store = NotificationStore::default();
        add_n(&store, 4);
        store.mark_all_read();
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let store = NotificationStore::new(0);
        add_n(&store, 3);
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.items()[0].title, "N3");
    }
}
