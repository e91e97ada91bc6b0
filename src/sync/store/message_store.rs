//! Conversation store: per-conversation message sequences and unread counters.
//!
//! Sequences live in an LRU keyed by conversation id. Every sequence is kept
//! sorted ascending by `created_at`, holds unique ids, and is capped to the
//! newest `max_messages_per_conversation` entries. Unread counters are kept
//! outside the LRU so an evicted conversation keeps its badge.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use lru::LruCache;
use tracing::debug;

use crate::sync::core::config::{StoreConfig, SyncConfig};
use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::ids::{ConversationId, MessageId};
use crate::sync::core::message::{Message, MessagePatch};
use crate::sync::ingest::dedupe::{ensure_id, find_optimistic_match, is_duplicate};
use crate::sync::pagination::merge::merge_messages;
use crate::sync::store::observable::{ListenerRegistry, Observable, Subscription};

/// Snapshot handed to message store listeners.
pub type MessageSnapshot = HashMap<ConversationId, Vec<Message>>;

type ConversationCache = LruCache<ConversationId, Vec<Message>>;

/// What a history page changed in a stored sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageMerge {
    /// Page items that were not already stored.
    pub added: usize,
    /// Whether the per-conversation cap dropped messages after the merge.
    pub trimmed: bool,
}

/// In-memory conversation store.
pub struct MessageStore {
    max_messages: usize,
    local_user_id: Option<String>,
    conversations: Mutex<ConversationCache>,
    unread: DashMap<ConversationId, u32>,
    active: Mutex<Option<ConversationId>>,
    listeners: ListenerRegistry<MessageSnapshot>,
}

impl MessageStore {
    /// Create a store with the given bounds.
    ///
    /// # Errors
    /// Returns an error if either bound is zero.
    pub fn new(config: &StoreConfig, local_user_id: Option<String>) -> SyncResult<Self> {
        let capacity = NonZeroUsize::new(config.max_conversations).ok_or_else(|| {
            SyncError::InvalidConfig("store.max_conversations must be > 0".to_string())
        })?;
        if config.max_messages_per_conversation == 0 {
            return Err(SyncError::InvalidConfig(
                "store.max_messages_per_conversation must be > 0".to_string(),
            ));
        }

        Ok(Self {
            max_messages: config.max_messages_per_conversation,
            local_user_id,
            conversations: Mutex::new(LruCache::new(capacity)),
            unread: DashMap::new(),
            active: Mutex::new(None),
            listeners: ListenerRegistry::new(),
        })
    }

    /// Create a store from the full sync configuration.
    ///
    /// # Errors
    /// Returns an error if the store bounds are invalid.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::new(&config.store, config.identity.local_user_id.clone())
    }

    fn lock_conversations(&self) -> MutexGuard<'_, ConversationCache> {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ConversationId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_of(cache: &ConversationCache) -> MessageSnapshot {
        cache
            .iter()
            .map(|(id, messages)| (id.clone(), messages.clone()))
            .collect()
    }

    fn publish(&self, snapshot: MessageSnapshot) {
        self.listeners.publish(&Arc::new(snapshot));
    }

    /// Insert or replace a sequence, logging any conversation pushed out of the LRU.
    fn insert_tracked(cache: &mut ConversationCache, id: &ConversationId, messages: Vec<Message>) {
        if let Some((evicted, dropped)) = cache.push(id.clone(), messages)
            && evicted != *id
        {
            debug!(
                conversation = %evicted,
                dropped_messages = dropped.len(),
                "Evicted least-recently-used conversation"
            );
        }
    }

    fn sequence_mut<'a>(cache: &'a mut ConversationCache, id: &ConversationId) -> &'a mut Vec<Message> {
        if !cache.contains(id) {
            Self::insert_tracked(cache, id, Vec::new());
        }
        cache.get_or_insert_mut(id.clone(), Vec::new)
    }

    fn sort_and_cap(sequence: &mut Vec<Message>, max_messages: usize) {
        sequence.sort_by_key(|message| message.created_at);
        if sequence.len() > max_messages {
            let excess = sequence.len() - max_messages;
            sequence.drain(..excess);
        }
    }

    /// Insert keeping ascending order; ties go after existing entries.
    fn insert_sorted(sequence: &mut Vec<Message>, message: Message) {
        let index = sequence.partition_point(|existing| existing.created_at <= message.created_at);
        sequence.insert(index, message);
    }

    fn append_locked(&self, id: &ConversationId, message: Message) -> Option<MessageSnapshot> {
        let mut cache = self.lock_conversations();
        let sequence = Self::sequence_mut(&mut cache, id);
        if sequence.iter().any(|existing| is_duplicate(existing, &message)) {
            debug!(conversation = %id, message = %message.id, "Dropped duplicate message");
            return None;
        }
        Self::insert_sorted(sequence, message);
        if sequence.len() > self.max_messages {
            let excess = sequence.len() - self.max_messages;
            sequence.drain(..excess);
        }
        Some(Self::snapshot_of(&cache))
    }

    /// Replace the stored sequence for a conversation (fresh page load).
    ///
    /// The sequence is deduplicated by id (first occurrence wins), sorted,
    /// and trimmed to the newest entries.
    pub fn set_messages(&self, id: &ConversationId, messages: Vec<Message>) {
        let mut seen: HashSet<MessageId> = HashSet::with_capacity(messages.len());
        let mut sequence: Vec<Message> = messages
            .into_iter()
            .map(ensure_id)
            .filter(|message| seen.insert(message.id.clone()))
            .collect();
        Self::sort_and_cap(&mut sequence, self.max_messages);

        let snapshot = {
            let mut cache = self.lock_conversations();
            Self::insert_tracked(&mut cache, id, sequence);
            Self::snapshot_of(&cache)
        };
        self.publish(snapshot);
    }

    /// Merge a fetched history page into the stored sequence in one step.
    ///
    /// Stored copies win on id collisions. Listeners hear about it only when
    /// the page added something.
    pub fn merge_page(&self, id: &ConversationId, page: Vec<Message>) -> PageMerge {
        if page.is_empty() {
            return PageMerge::default();
        }
        let page: Vec<Message> = page.into_iter().map(ensure_id).collect();

        let (result, snapshot) = {
            let mut cache = self.lock_conversations();
            let sequence = Self::sequence_mut(&mut cache, id);
            let before = sequence.len();
            let mut merged = merge_messages(sequence, page);
            let added = merged.len() - before;
            let merged_len = merged.len();
            Self::sort_and_cap(&mut merged, self.max_messages);
            let trimmed = merged.len() < merged_len;
            *sequence = merged;

            let snapshot = (added > 0).then(|| Self::snapshot_of(&cache));
            (PageMerge { added, trimmed }, snapshot)
        };
        if let Some(snapshot) = snapshot {
            self.publish(snapshot);
        }
        result
    }

    /// Append a locally composed message without touching unread counters.
    ///
    /// Returns `false` if a message with the same id is already stored.
    pub fn add_message_to_chat(&self, id: &ConversationId, message: Message) -> bool {
        match self.append_locked(id, ensure_id(message)) {
            Some(snapshot) => {
                self.publish(snapshot);
                true
            }
            None => false,
        }
    }

    /// Append a message delivered by the event source.
    ///
    /// Same as `add_message_to_chat`, but bumps the unread counter unless the
    /// conversation is active or the local user wrote the message.
    pub fn on_new_message(&self, id: &ConversationId, message: Message) -> bool {
        let counts_as_unread = !message.is_authored_by(self.local_user_id.as_deref());
        let Some(snapshot) = self.append_locked(id, ensure_id(message)) else {
            return false;
        };

        if counts_as_unread && !self.is_active(id) {
            *self.unread.entry(id.clone()).or_insert(0) += 1;
        }
        self.publish(snapshot);
        true
    }

    /// Merge `patch` into the message with `message_id`.
    ///
    /// Returns `false` if no such message exists. When the patch renames the
    /// message onto an id already present, the other entry is dropped so ids
    /// stay unique; the last write wins.
    pub fn update_message(
        &self,
        id: &ConversationId,
        message_id: &MessageId,
        patch: MessagePatch,
    ) -> bool {
        let snapshot = {
            let mut cache = self.lock_conversations();
            let Some(sequence) = cache.get_mut(id) else {
                return false;
            };
            let Some(index) = sequence.iter().position(|m| &m.id == message_id) else {
                return false;
            };

            let previous_created_at = sequence[index].created_at;
            patch.apply(&mut sequence[index]);

            let renamed = sequence[index].id != *message_id;
            if renamed || sequence[index].created_at != previous_created_at {
                let updated = sequence.remove(index);
                if renamed {
                    sequence.retain(|other| other.id != updated.id);
                }
                Self::insert_sorted(sequence, updated);
            }
            Self::snapshot_of(&cache)
        };
        self.publish(snapshot);
        true
    }

    /// Messages of a conversation, oldest first. Counts as an access for LRU.
    #[must_use]
    pub fn get_messages(&self, id: &ConversationId) -> Vec<Message> {
        self.lock_conversations()
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the conversation holds a message with `message_id`.
    ///
    /// Does not touch LRU order.
    #[must_use]
    pub fn contains_message(&self, id: &ConversationId, message_id: &MessageId) -> bool {
        self.lock_conversations()
            .peek(id)
            .is_some_and(|sequence| sequence.iter().any(|m| &m.id == message_id))
    }

    /// Id of the pending optimistic message that `echo` confirms, if any.
    ///
    /// Searches in place without cloning or touching LRU order.
    #[must_use]
    pub fn find_pending_echo(
        &self,
        id: &ConversationId,
        echo: &Message,
        window_ms: i64,
    ) -> Option<MessageId> {
        self.lock_conversations().peek(id).and_then(|sequence| {
            find_optimistic_match(sequence, echo, window_ms).map(|pending| pending.id.clone())
        })
    }

    /// Number of stored messages, without touching LRU order.
    #[must_use]
    pub fn message_count(&self, id: &ConversationId) -> usize {
        self.lock_conversations().peek(id).map_or(0, Vec::len)
    }

    /// Whether the conversation is currently cached.
    #[must_use]
    pub fn contains(&self, id: &ConversationId) -> bool {
        self.lock_conversations().contains(id)
    }

    /// Number of cached conversations.
    #[must_use]
    pub fn conversation_count(&self) -> usize {
        self.lock_conversations().len()
    }

    /// Cached conversation ids, most recently used first.
    #[must_use]
    pub fn conversation_ids(&self) -> Vec<ConversationId> {
        self.lock_conversations()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Copy of every cached sequence.
    #[must_use]
    pub fn snapshot(&self) -> MessageSnapshot {
        Self::snapshot_of(&self.lock_conversations())
    }

    /// Unread counter of a conversation.
    #[must_use]
    pub fn get_unread_count(&self, id: &ConversationId) -> u32 {
        self.unread.get(id).map_or(0, |count| *count)
    }

    /// Sum of all unread counters.
    #[must_use]
    pub fn total_unread(&self) -> u32 {
        self.unread.iter().map(|entry| *entry.value()).sum()
    }

    /// Reset the unread counter of a conversation.
    pub fn mark_as_read(&self, id: &ConversationId) {
        self.unread.remove(id);
        let snapshot = self.snapshot();
        self.publish(snapshot);
    }

    /// Drop the cached sequence of a conversation.
    pub fn clear_messages(&self, id: &ConversationId) -> bool {
        let snapshot = {
            let mut cache = self.lock_conversations();
            if cache.pop(id).is_none() {
                return false;
            }
            Self::snapshot_of(&cache)
        };
        self.publish(snapshot);
        true
    }

    /// Drop every sequence and unread counter.
    pub fn clear_all(&self) {
        self.lock_conversations().clear();
        self.unread.clear();
        self.publish(MessageSnapshot::new());
    }

    /// Set the conversation exempt from unread counting.
    ///
    /// This does not reset its existing counter: call `mark_as_read` after
    /// switching, in that order.
    pub fn set_active_conversation(&self, id: Option<ConversationId>) {
        *self.lock_active() = id;
    }

    /// Currently active conversation.
    #[must_use]
    pub fn active_conversation(&self) -> Option<ConversationId> {
        self.lock_active().clone()
    }

    fn is_active(&self, id: &ConversationId) -> bool {
        self.lock_active().as_ref() == Some(id)
    }
}

impl Observable for MessageStore {
    type Snapshot = MessageSnapshot;

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
    use crate::sync::core::message::{MessageContent, MessageStatus, Role};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> MessageStore {
        MessageStore::new(&StoreConfig::default(), Some("me".to_string())).unwrap()
    }

    fn cid(id: &str) -> ConversationId {
        ConversationId::from(id)
    }

    fn msg(id: &str, at: i64) -> Message {
        Message::new(id, "c1", Role::Assistant, at, MessageContent::Text(id.to_string()))
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_sequence_stays_sorted() {
        let store = store();
        let c1 = cid("c1");
        store.set_messages(&c1, vec![msg("b", 20), msg("a", 10)]);
        store.add_message_to_chat(&c1, msg("d", 40));
        store.on_new_message(&c1, msg("c", 30));
        store.add_message_to_chat(&c1, msg("z", 5));

        let messages = store.get_messages(&c1);
        assert_eq!(ids(&messages), vec!["z", "a", "b", "c", "d"]);
        assert!(messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let store = store();
        let c1 = cid("c1");
        store.add_message_to_chat(&c1, msg("first", 10));
        store.add_message_to_chat(&c1, msg("second", 10));
        assert_eq!(ids(&store.get_messages(&c1)), vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_id_is_dropped() {
        let store = store();
        let c1 = cid("c1");
        assert!(store.add_message_to_chat(&c1, msg("a", 10)));
        assert!(!store.add_message_to_chat(&c1, msg("a", 99)));
        assert!(!store.on_new_message(&c1, msg("a", 10)));
        assert_eq!(store.message_count(&c1), 1);
        assert_eq!(store.get_unread_count(&c1), 0);
    }

    #[test]
    fn test_set_messages_dedupes_input() {
        let store = store();
        let c1 = cid("c1");
        store.set_messages(&c1, vec![msg("a", 1), msg("a", 2), msg("b", 3)]);
        assert_eq!(ids(&store.get_messages(&c1)), vec!["a", "b"]);
    }

    #[test]
    fn test_lru_bound() {
        let store = store();
        for i in 0..101 {
            let id = cid(&format!("c{i}"));
            store.add_message_to_chat(&id, msg(&format!("m{i}"), i));
        }
        assert_eq!(store.conversation_count(), 100);
        assert!(!store.contains(&cid("c0")));
        assert!(store.contains(&cid("c100")));
    }

    #[test]
    fn test_lru_respects_reads() {
        let store = store();
        for i in 0..100 {
            store.set_messages(&cid(&format!("c{i}")), vec![msg("m", i)]);
        }
        let _ = store.get_messages(&cid("c0"));
        store.set_messages(&cid("c100"), vec![msg("m", 100)]);

        assert!(store.contains(&cid("c0")));
        assert!(!store.contains(&cid("c1")));
    }

    #[test]
    fn test_per_conversation_cap() {
        let store = store();
        let c1 = cid("c1");
        for i in 0..600 {
            store.add_message_to_chat(&c1, msg(&format!("m{i}"), i));
        }
        let messages = store.get_messages(&c1);
        assert_eq!(messages.len(), 500);
        assert_eq!(messages[0].id.as_str(), "m100");
        assert_eq!(messages[499].id.as_str(), "m599");
    }

    #[test]
    fn test_set_messages_keeps_newest() {
        let config = StoreConfig {
            max_messages_per_conversation: 3,
            max_conversations: 10,
        };
        let store = MessageStore::new(&config, None).unwrap();
        let c1 = cid("c1");
        store.set_messages(&c1, (0..5).map(|i| msg(&format!("m{i}"), i)).collect());
        assert_eq!(ids(&store.get_messages(&c1)), vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_unread_suppressed_for_active_conversation() {
        let store = store();
        store.set_active_conversation(Some(cid("A")));

        store.on_new_message(&cid("A"), msg("a1", 1).with_sender("bob"));
        store.on_new_message(&cid("B"), msg("b1", 1).with_sender("bob"));

        assert_eq!(store.get_unread_count(&cid("A")), 0);
        assert_eq!(store.get_unread_count(&cid("B")), 1);
    }

    #[test]
    fn test_own_messages_do_not_count() {
        let store = store();
        let c1 = cid("c1");
        store.on_new_message(&c1, msg("a", 1).with_sender("me"));
        let mut typed = msg("b", 2);
        typed.role = Role::User;
        store.on_new_message(&c1, typed);
        assert_eq!(store.get_unread_count(&c1), 0);
    }

    #[test]
    fn test_add_message_never_counts() {
        let store = store();
        let c1 = cid("c1");
        store.add_message_to_chat(&c1, msg("a", 1).with_sender("bob"));
        assert_eq!(store.get_unread_count(&c1), 0);
    }

    #[test]
    fn test_activation_does_not_reset_unread() {
        let store = store();
        let c1 = cid("c1");
        store.on_new_message(&c1, msg("a", 1));
        store.on_new_message(&c1, msg("b", 2));
        store.set_active_conversation(Some(c1.clone()));
        assert_eq!(store.get_unread_count(&c1), 2);

        store.mark_as_read(&c1);
        assert_eq!(store.get_unread_count(&c1), 0);
        assert_eq!(store.total_unread(), 0);
    }

    #[test]
    fn test_unread_survives_eviction() {
        let config = StoreConfig {
            max_messages_per_conversation: 10,
            max_conversations: 1,
        };
        let store = MessageStore::new(&config, None).unwrap();
        store.on_new_message(&cid("c1"), msg("a", 1));
        store.on_new_message(&cid("c2"), msg("b", 1));
        assert!(!store.contains(&cid("c1")));
        assert_eq!(store.get_unread_count(&cid("c1")), 1);
    }

    #[test]
    fn test_optimistic_send_reconciliation() {
        let store = store();
        let c1 = cid("c1");
        let pending = msg("tmp1", 100).with_status(MessageStatus::Sending);
        store.add_message_to_chat(&c1, pending);

        let patch = MessagePatch::confirmed(MessageId::from("srv1"));
        assert!(store.update_message(&c1, &MessageId::from("tmp1"), patch));

        let messages = store.get_messages(&c1);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id.as_str(), "srv1");
        assert_eq!(messages[0].status, MessageStatus::Complete);
    }

    #[test]
    fn test_rename_onto_existing_id_keeps_ids_unique() {
        let store = store();
        let c1 = cid("c1");
        store.add_message_to_chat(&c1, msg("tmp1", 100).with_status(MessageStatus::Sending));
        store.add_message_to_chat(&c1, msg("srv1", 101));

        store.update_message(
            &c1,
            &MessageId::from("tmp1"),
            MessagePatch::confirmed(MessageId::from("srv1")),
        );
        let messages = store.get_messages(&c1);
        assert_eq!(ids(&messages), vec!["srv1"]);
        assert_eq!(messages[0].created_at, 100);
    }

    #[test]
    fn test_update_moves_message_when_time_changes() {
        let store = store();
        let c1 = cid("c1");
        store.set_messages(&c1, vec![msg("a", 10), msg("b", 20)]);
        let patch = MessagePatch {
            created_at: Some(30),
            ..MessagePatch::default()
        };
        store.update_message(&c1, &MessageId::from("a"), patch);
        assert_eq!(ids(&store.get_messages(&c1)), vec!["b", "a"]);
    }

    #[test]
    fn test_update_missing_is_noop() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!store.update_message(&cid("c1"), &MessageId::from("x"), MessagePatch::default()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_replays_then_follows_mutations() {
        let store = store();
        let c1 = cid("c1");
        store.add_message_to_chat(&c1, msg("a", 1));

        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        let sub = store.subscribe(move |snapshot| {
            let len = snapshot.get("c1").map_or(0, Vec::len);
            sink.lock().unwrap().push(len);
        });

        store.add_message_to_chat(&c1, msg("b", 2));
        assert!(sub.unsubscribe());
        store.add_message_to_chat(&c1, msg("c", 3));

        assert_eq!(*sizes.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_listener_sees_post_mutation_unread() {
        let store = Arc::new(store());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reader = Arc::clone(&store);
        let _sub = store.subscribe(move |_| {
            sink.lock().unwrap().push(reader.get_unread_count(&cid("c1")));
        });

        store.on_new_message(&cid("c1"), msg("a", 1));
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_panicking_listener_does_not_corrupt_store() {
        let store = store();
        let _bad = store.subscribe(|snapshot| {
            assert!(snapshot.is_empty(), "boom");
        });
        let c1 = cid("c1");
        store.add_message_to_chat(&c1, msg("a", 1));
        store.add_message_to_chat(&c1, msg("b", 2));
        assert_eq!(store.message_count(&c1), 2);
    }

    #[test]
    fn test_clear_operations() {
        let store = store();
        store.on_new_message(&cid("c1"), msg("a", 1));
        store.on_new_message(&cid("c2"), msg("b", 1));

        assert!(store.clear_messages(&cid("c1")));
        assert!(!store.clear_messages(&cid("c1")));
        assert_eq!(store.conversation_count(), 1);

        store.clear_all();
        assert_eq!(store.conversation_count(), 0);
        assert_eq!(store.total_unread(), 0);
    }

    #[test]
    fn test_merge_page_twice_is_noop() {
        let store = store();
        let c1 = cid("c1");
        store.set_messages(&c1, vec![msg("c", 30), msg("d", 40)]);
        let page = vec![msg("b", 20), msg("a", 10)];

        let first = store.merge_page(&c1, page.clone());
        assert_eq!(first, PageMerge { added: 2, trimmed: false });
        let after_first = store.get_messages(&c1);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let second = store.merge_page(&c1, page);
        assert_eq!(second, PageMerge::default());
        assert_eq!(store.get_messages(&c1), after_first);
        assert_eq!(ids(&after_first), vec!["a", "b", "c", "d"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_merge_page_keeps_live_arrivals() {
        let store = store();
        let c1 = cid("c1");
        store.set_messages(&c1, vec![msg("m5", 50)]);
        store.on_new_message(&c1, msg("live", 60));

        let merged = store.merge_page(&c1, vec![msg("m4", 40), msg("m5", 50)]);
        assert_eq!(merged.added, 1);
        assert_eq!(ids(&store.get_messages(&c1)), vec!["m4", "m5", "live"]);
        assert_eq!(store.get_unread_count(&c1), 1);
    }

    #[test]
    fn test_merge_page_reports_trim() {
        let config = StoreConfig {
            max_messages_per_conversation: 3,
            max_conversations: 10,
        };
        let store = MessageStore::new(&config, None).unwrap();
        let c1 = cid("c1");
        store.set_messages(&c1, vec![msg("m3", 3), msg("m4", 4)]);
        let merged = store.merge_page(&c1, vec![msg("m1", 1), msg("m2", 2)]);
        assert_eq!(merged, PageMerge { added: 2, trimmed: true });
        assert_eq!(ids(&store.get_messages(&c1)), vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_merge_empty_page_creates_nothing() {
        let store = store();
        assert_eq!(store.merge_page(&cid("c1"), Vec::new()), PageMerge::default());
        assert!(!store.contains(&cid("c1")));
    }

    #[test]
    fn test_peek_helpers_keep_lru_order() {
        let config = StoreConfig {
            max_messages_per_conversation: 10,
            max_conversations: 2,
        };
        let store = MessageStore::new(&config, None).unwrap();
        let pending = Message::optimistic(
            cid("c1"),
            Some("me".to_string()),
            MessageContent::Text("ok".to_string()),
            Vec::new(),
        );
        let pending_id = pending.id.clone();
        let echo = Message::new(
            "srv1",
            "c1",
            Role::User,
            pending.created_at,
            MessageContent::Text("ok".to_string()),
        )
        .with_sender("me");
        store.add_message_to_chat(&cid("c1"), pending);
        store.add_message_to_chat(&cid("c2"), msg("x", 1));

        assert!(store.contains_message(&cid("c1"), &pending_id));
        assert!(!store.contains_message(&cid("c1"), &MessageId::from("nope")));
        assert_eq!(store.find_pending_echo(&cid("c1"), &echo, 60_000), Some(pending_id));

        store.add_message_to_chat(&cid("c3"), msg("y", 1));
        assert!(!store.contains(&cid("c1")));
    }

    #[test]
    fn test_missing_id_is_assigned() {
        let store = store();
        let c1 = cid("c1");
        store.add_message_to_chat(&c1, msg("", 1));
        let messages = store.get_messages(&c1);
        assert!(!messages[0].id.is_empty());
    }
}
