//! Per-conversation notification lists with a "has new" flag.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use tracing::debug;

use crate::sync::core::ids::{ConversationId, NotificationId};
use crate::sync::core::notification::Notification;
use crate::sync::ingest::dedupe::ensure_notification_id;
use crate::sync::pagination::merge::merge_notifications;
use crate::sync::store::observable::{ListenerRegistry, Observable, Subscription};

/// Snapshot handed to notification store listeners.
pub type NotificationSnapshot = HashMap<ConversationId, Vec<Notification>>;

/// In-memory notification store. Lists are kept newest first.
pub struct NotificationStore {
    lists: Mutex<NotificationSnapshot>,
    has_new: DashMap<ConversationId, bool>,
    listeners: ListenerRegistry<NotificationSnapshot>,
}

impl NotificationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lists: Mutex::new(HashMap::new()),
            has_new: DashMap::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    fn lock_lists(&self) -> MutexGuard<'_, NotificationSnapshot> {
        self.lists.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, snapshot: NotificationSnapshot) {
        self.listeners.publish(&Arc::new(snapshot));
    }

    /// Prepend a live notification and raise the "has new" flag.
    ///
    /// Returns `false` if a notification with the same id is already listed.
    pub fn add_notification(&self, id: &ConversationId, notification: Notification) -> bool {
        let notification = ensure_notification_id(notification);
        let snapshot = {
            let mut lists = self.lock_lists();
            let list = lists.entry(id.clone()).or_default();
            if list.iter().any(|existing| existing.id == notification.id) {
                debug!(conversation = %id, notification = %notification.id, "Dropped duplicate notification");
                return false;
            }
            list.insert(0, notification);
            lists.clone()
        };
        self.has_new.insert(id.clone(), true);
        self.publish(snapshot);
        true
    }

    /// Replace the list for a conversation.
    pub fn set_notifications(&self, id: &ConversationId, notifications: Vec<Notification>) {
        let notifications = notifications
            .into_iter()
            .map(ensure_notification_id)
            .collect::<Vec<_>>();
        let list = merge_notifications(&[], notifications);
        let snapshot = {
            let mut lists = self.lock_lists();
            lists.insert(id.clone(), list);
            lists.clone()
        };
        self.publish(snapshot);
    }

    /// Append a fetched page behind the listed notifications.
    ///
    /// Listed entries keep their position. Returns how many entries were new.
    pub fn append_page(&self, id: &ConversationId, page: Vec<Notification>) -> usize {
        let page = page
            .into_iter()
            .map(ensure_notification_id)
            .collect::<Vec<_>>();
        let (added, snapshot) = {
            let mut lists = self.lock_lists();
            let list = lists.entry(id.clone()).or_default();
            let before = list.len();
            let merged = merge_notifications(list, page);
            let added = merged.len() - before;
            *list = merged;
            (added, (added > 0).then(|| lists.clone()))
        };
        if let Some(snapshot) = snapshot {
            self.publish(snapshot);
        }
        added
    }

    /// Notifications of a conversation, newest first.
    #[must_use]
    pub fn get_notifications(&self, id: &ConversationId) -> Vec<Notification> {
        self.lock_lists().get(id).cloned().unwrap_or_default()
    }

    /// Number of listed notifications.
    #[must_use]
    pub fn notification_count(&self, id: &ConversationId) -> usize {
        self.lock_lists().get(id).map_or(0, Vec::len)
    }

    /// Remove a notification wherever it is listed.
    pub fn remove_notification(&self, notification_id: &NotificationId) -> bool {
        let snapshot = {
            let mut lists = self.lock_lists();
            let mut removed = false;
            for list in lists.values_mut() {
                let before = list.len();
                list.retain(|n| &n.id != notification_id);
                removed |= list.len() != before;
            }
            if !removed {
                return false;
            }
            lists.clone()
        };
        self.publish(snapshot);
        true
    }

    /// Drop the list of one conversation.
    pub fn clear(&self, id: &ConversationId) {
        let snapshot = {
            let mut lists = self.lock_lists();
            lists.remove(id);
            lists.clone()
        };
        self.has_new.remove(id);
        self.publish(snapshot);
    }

    /// Drop every list and flag.
    pub fn clear_all(&self) {
        self.lock_lists().clear();
        self.has_new.clear();
        self.publish(NotificationSnapshot::new());
    }

    /// Lower the "has new" flag.
    pub fn mark_as_read(&self, id: &ConversationId) {
        self.has_new.remove(id);
        let snapshot = self.snapshot();
        self.publish(snapshot);
    }

    /// Whether a live notification arrived since the last `mark_as_read`.
    #[must_use]
    pub fn has_new(&self, id: &ConversationId) -> bool {
        self.has_new.get(id).is_some_and(|flag| *flag)
    }

    /// Copy of every list.
    #[must_use]
    pub fn snapshot(&self) -> NotificationSnapshot {
        self.lock_lists().clone()
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Observable for NotificationStore {
    type Snapshot = NotificationSnapshot;

    fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Arc<Self::Snapshot>) + Send + Sync + 'static,
    {
        let current = Arc::new(self.snapshot());
        self.listeners.register(Arc::new(listener), current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid() -> ConversationId {
        ConversationId::from("c1")
    }

    fn titles(store: &NotificationStore) -> Vec<String> {
        store
            .get_notifications(&cid())
            .into_iter()
            .map(|n| n.title)
            .collect()
    }

    #[test]
    fn test_add_prepends_and_flags() {
        let store = NotificationStore::new();
        assert!(store.add_notification(&cid(), Notification::new("n1", "first", 1)));
        assert!(store.add_notification(&cid(), Notification::new("n2", "second", 2)));
        assert_eq!(titles(&store), vec!["second", "first"]);
        assert!(store.has_new(&cid()));

        store.mark_as_read(&cid());
        assert!(!store.has_new(&cid()));
    }

    #[test]
    fn test_add_drops_duplicate_id() {
        let store = NotificationStore::new();
        store.add_notification(&cid(), Notification::new("n1", "a", 1));
        assert!(!store.add_notification(&cid(), Notification::new("n1", "b", 1)));
        assert_eq!(store.notification_count(&cid()), 1);
    }

    #[test]
    fn test_missing_id_is_generated() {
        let store = NotificationStore::new();
        store.add_notification(&cid(), Notification::new("", "a", 1));
        store.add_notification(&cid(), Notification::new("", "b", 2));
        assert_eq!(store.notification_count(&cid()), 2);
    }

    #[test]
    fn test_append_page_counts_new_entries() {
        let store = NotificationStore::new();
        store.set_notifications(
            &cid(),
            vec![Notification::new("n3", "c", 30), Notification::new("n4", "d", 40)],
        );
        let added = store.append_page(
            &cid(),
            vec![Notification::new("n2", "b", 20), Notification::new("n3", "c", 30)],
        );
        assert_eq!(added, 1);
        assert_eq!(titles(&store), vec!["d", "c", "b"]);
        assert!(!store.has_new(&cid()));
    }

    #[test]
    fn test_live_arrival_stays_on_top_after_page() {
        let store = NotificationStore::new();
        store.set_notifications(&cid(), vec![Notification::new("n3", "c", 30)]);
        store.add_notification(&cid(), Notification::new("late", "delayed", 5));

        let added = store.append_page(
            &cid(),
            vec![Notification::new("n2", "b", 20), Notification::new("n1", "a", 10)],
        );
        assert_eq!(added, 2);
        assert_eq!(titles(&store), vec!["delayed", "c", "b", "a"]);
    }

    #[test]
    fn test_repeated_page_is_silent() {
        let store = NotificationStore::new();
        let page = vec![Notification::new("n1", "a", 10)];
        store.append_page(&cid(), page.clone());

        let calls = Arc::new(Mutex::new(0_usize));
        let sink = Arc::clone(&calls);
        let _sub = store.subscribe(move |_| {
            *sink.lock().unwrap() += 1;
        });
        assert_eq!(store.append_page(&cid(), page), 0);
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(titles(&store), vec!["a"]);
    }

    #[test]
    fn test_remove_across_conversations() {
        let store = NotificationStore::new();
        store.add_notification(&cid(), Notification::new("n1", "a", 1));
        store.add_notification(&ConversationId::from("c2"), Notification::new("n2", "b", 1));

        assert!(store.remove_notification(&NotificationId::from("n2")));
        assert!(!store.remove_notification(&NotificationId::from("n2")));
        assert_eq!(store.notification_count(&ConversationId::from("c2")), 0);
        assert_eq!(store.notification_count(&cid()), 1);
    }

    #[test]
    fn test_clear_resets_flag() {
        let store = NotificationStore::new();
        store.add_notification(&cid(), Notification::new("n1", "a", 1));
        store.clear(&cid());
        assert!(!store.has_new(&cid()));
        assert_eq!(store.notification_count(&cid()), 0);

        store.add_notification(&cid(), Notification::new("n1", "a", 1));
        store.clear_all();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_subscribe_replays_current() {
        let store = NotificationStore::new();
        store.add_notification(&cid(), Notification::new("n1", "a", 1));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |snapshot| {
            sink.lock().unwrap().push(snapshot.get("c1").map_or(0, Vec::len));
        });
        store.add_notification(&cid(), Notification::new("n2", "b", 2));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
