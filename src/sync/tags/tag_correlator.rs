//! Latest interaction tag (`i_tag`) per conversation.
//!
//! Agent messages may carry an `i_tag` in their structured content. The
//! most recent one is echoed back on the next send so the agent can
//! continue the interaction it started. The map is persisted as one JSON
//! blob in the side store and reloaded on construction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::sync::core::errors::SyncError;
use crate::sync::core::ids::ConversationId;
use crate::sync::core::message::{Message, MessageContent};
use crate::sync::tags::side_store::KeyValueStore;

/// Read the interaction tag carried by structured content, if any.
#[must_use]
pub fn extract_i_tag(content: &MessageContent) -> Option<String> {
    let structured = content.structured()?;
    let tag = structured.get("i_tag")?.as_str()?.trim();
    (!tag.is_empty()).then(|| tag.to_string())
}

/// Tracks and persists the latest tag per conversation.
pub struct TagCorrelator {
    store: Arc<dyn KeyValueStore>,
    key: String,
    latest: Mutex<HashMap<ConversationId, String>>,
}

impl TagCorrelator {
    /// Create a correlator and reload the persisted map.
    ///
    /// A missing, unreadable or malformed blob yields an empty map.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let latest = Self::load(store.as_ref(), &key);
        debug!(key = %key, conversations = latest.len(), "Loaded interaction tags");
        Self {
            store,
            key,
            latest: Mutex::new(latest),
        }
    }

    fn load(store: &dyn KeyValueStore, key: &str) -> HashMap<ConversationId, String> {
        let raw = match store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return HashMap::new(),
            Err(error) => {
                warn!(key, error = %error, "Failed to read interaction tags");
                return HashMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|error| {
            warn!(key, error = %error, "Discarded malformed interaction tags");
            HashMap::new()
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, String>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest tag of a conversation.
    #[must_use]
    pub fn get_latest(&self, id: &ConversationId) -> Option<String> {
        self.lock().get(id).cloned()
    }

    /// Record `tag` as the latest for `id` and persist the map.
    ///
    /// Blank tags are ignored. Returns whether the map changed in memory;
    /// a failed write is logged and the in-memory value kept.
    pub fn set_latest(&self, id: &ConversationId, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }

        let serialized = {
            let mut latest = self.lock();
            if latest.get(id).map(String::as_str) == Some(tag) {
                return false;
            }
            latest.insert(id.clone(), tag.to_string());
            serde_json::to_string(&*latest)
        };

        let persisted = serialized
            .map_err(SyncError::from)
            .and_then(|blob| self.store.set(&self.key, &blob));
        if let Err(error) = persisted {
            warn!(conversation = %id, error = %error, "Failed to persist interaction tags");
        }
        true
    }

    /// Record the tag carried by `message`, if any. Returns the tag.
    pub fn observe(&self, id: &ConversationId, message: &Message) -> Option<String> {
        let tag = extract_i_tag(&message.content)?;
        self.set_latest(id, &tag);
        Some(tag)
    }

    /// Number of conversations with a tag.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no conversation has a tag.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
