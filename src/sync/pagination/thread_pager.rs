//! Reverse (older-first) pagination of a conversation thread.
//!
//! The pager loads history pages newest-first from the backend and merges
//! them in front of what the store already holds. A single fetch may be in
//! flight; switching conversations while it runs discards its response.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::sync::core::config::PaginationConfig;
use crate::sync::core::ids::ConversationId;
use crate::sync::pagination::merge::page_has_more;
use crate::sync::pagination::request_slot::RequestSlot;
use crate::sync::pagination::scroll::ScrollAnchor;
use crate::sync::store::message_store::{MessageStore, PageMerge};
use crate::sync::transport::client::{ApiResponse, ChatTransport, FetchRequest};

/// Result of a page load attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and merged.
    Loaded {
        /// Items returned by the backend.
        received: usize,
        /// Items that were not already stored.
        added: usize,
        /// Whether another page may exist.
        has_more: bool,
    },
    /// No conversation is open.
    NoConversation,
    /// The previous page was short; nothing was requested.
    Exhausted,
    /// Another load is in flight; nothing was requested.
    Busy,
    /// The pager was re-targeted while the request ran; the response was dropped.
    Stale,
    /// The backend failed; the store is unchanged.
    Failed {
        /// Error text.
        reason: String,
    },
}

impl LoadOutcome {
    /// Whether new items reached the store.
    #[must_use]
    pub const fn added_items(&self) -> bool {
        matches!(self, Self::Loaded { added, .. } if *added > 0)
    }
}

/// Outcome of `load_older`, with the anchor captured before the request.
#[derive(Clone, Debug, PartialEq)]
pub struct PageLoad {
    /// What happened.
    pub outcome: LoadOutcome,
    /// Scroll position at request time.
    pub anchor: Option<ScrollAnchor>,
}

impl PageLoad {
    /// Scroll offset to apply once the prepended page has rendered.
    ///
    /// `None` when nothing was prepended or no anchor was captured.
    #[must_use]
    pub fn restored_scroll_top(&self, new_scroll_height: f64) -> Option<f64> {
        if !self.outcome.added_items() {
            return None;
        }
        self.anchor
            .map(|anchor| anchor.compensate(new_scroll_height))
    }
}

#[derive(Debug)]
struct PagerCursor {
    conversation_id: Option<ConversationId>,
    has_more: bool,
}

/// Older-history pager for the open conversation.
pub struct ThreadPager {
    store: Arc<MessageStore>,
    transport: Arc<dyn ChatTransport>,
    page_size: usize,
    slot: RequestSlot,
    cursor: Mutex<PagerCursor>,
}

impl ThreadPager {
    /// Create a pager with no open conversation.
    #[must_use]
    pub fn new(
        store: Arc<MessageStore>,
        transport: Arc<dyn ChatTransport>,
        config: &PaginationConfig,
    ) -> Self {
        Self {
            store,
            transport,
            page_size: config.message_page_size,
            slot: RequestSlot::new(),
            cursor: Mutex::new(PagerCursor {
                conversation_id: None,
                has_more: false,
            }),
        }
    }

    fn lock_cursor(&self) -> MutexGuard<'_, PagerCursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point the pager at `id`. Any in-flight load becomes stale.
    pub fn open(&self, id: ConversationId) {
        let epoch = self.slot.invalidate();
        debug!(conversation = %id, epoch, "Opened thread pager");
        *self.lock_cursor() = PagerCursor {
            conversation_id: Some(id),
            has_more: true,
        };
    }

    /// Re-arm pagination for the open conversation.
    pub fn refresh(&self) {
        self.slot.invalidate();
        self.lock_cursor().has_more = true;
    }

    /// Open conversation.
    #[must_use]
    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.lock_cursor().conversation_id.clone()
    }

    /// Whether older history may remain on the server.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.lock_cursor().has_more
    }

    /// Whether a load is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.slot.is_fetching()
    }

    /// Load the next page of older history.
    ///
    /// `anchor` is the scroll position captured just before the request; it
    /// is handed back so the caller can keep the viewport steady.
    pub async fn load_older(&self, anchor: Option<ScrollAnchor>) -> PageLoad {
        let outcome = self.load_older_page().await;
        PageLoad { outcome, anchor }
    }

    async fn load_older_page(&self) -> LoadOutcome {
        let (conversation_id, has_more) = {
            let cursor = self.lock_cursor();
            (cursor.conversation_id.clone(), cursor.has_more)
        };
        let Some(conversation_id) = conversation_id else {
            return LoadOutcome::NoConversation;
        };
        if !has_more {
            return LoadOutcome::Exhausted;
        }
        let Some(flight) = self.slot.try_begin() else {
            return LoadOutcome::Busy;
        };

        let request = FetchRequest {
            conversation_id: conversation_id.clone(),
            limit: self.page_size,
            offset: self.store.message_count(&conversation_id),
            reverse: true,
        };
        let response = self.transport.fetch_messages(request).await;

        if !flight.is_current() {
            debug!(conversation = %conversation_id, "Discarded stale history page");
            return LoadOutcome::Stale;
        }

        let page = match response.and_then(ApiResponse::into_result) {
            Ok(page) => page,
            Err(error) => {
                warn!(
                    conversation = %conversation_id,
                    error = %error,
                    "Failed to load older messages"
                );
                return LoadOutcome::Failed {
                    reason: error.to_string(),
                };
            }
        };

        let received = page.len();
        let PageMerge { added, trimmed } = self.store.merge_page(&conversation_id, page);

        // Once the store trims the page away, the offset can no longer advance.
        let has_more = page_has_more(received, self.page_size) && !trimmed;
        {
            let mut cursor = self.lock_cursor();
            if cursor.conversation_id.as_ref() == Some(&conversation_id) {
                cursor.has_more = has_more;
            }
        }
        drop(flight);

        debug!(
            conversation = %conversation_id,
            received,
            added,
            has_more,
            "Loaded older messages"
        );
        LoadOutcome::Loaded {
            received,
            added,
            has_more,
        }
    }
}
