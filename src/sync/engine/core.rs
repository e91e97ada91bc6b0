//! Sync engine orchestration.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::sync::core::config::SyncConfig;
use crate::sync::core::errors::SyncResult;
use crate::sync::core::ids::{ConversationId, MessageId};
use crate::sync::core::message::{Attachment, Message, MessageContent, MessagePatch, MessageStatus};
use crate::sync::ingest::dedupe::dedupe_for_render;
use crate::sync::ingest::inbound_event::InboundEvent;
use crate::sync::pagination::notification_feed::NotificationFeed;
use crate::sync::pagination::thread_pager::ThreadPager;
use crate::sync::store::message_store::MessageStore;
use crate::sync::store::notification_store::NotificationStore;
use crate::sync::tags::side_store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
use crate::sync::tags::tag_correlator::TagCorrelator;
use crate::sync::transport::client::{ApiResponse, ChatTransport, SendPayload};

/// Backend dependencies for the sync engine.
pub struct SyncBackends {
    /// Chat backend.
    pub transport: Arc<dyn ChatTransport>,
    /// Durable side store for interaction tags.
    pub side_store: Arc<dyn KeyValueStore>,
}

impl SyncBackends {
    /// Use the `SQLite` side store configured in `config.tags`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub fn sqlite(config: &SyncConfig, transport: Arc<dyn ChatTransport>) -> SyncResult<Self> {
        let side_store = SqliteKeyValueStore::open(&config.tags.sqlite_path, &config.tags.table)?;
        Ok(Self {
            transport,
            side_store: Arc::new(side_store),
        })
    }

    /// Keep interaction tags in memory only.
    #[must_use]
    pub fn in_memory(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            side_store: Arc::new(MemoryKeyValueStore::new()),
        }
    }
}

/// Message composed by the local user.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutgoingMessage {
    /// Body.
    pub content: MessageContent,
    /// Attachments.
    pub attachments: Vec<Attachment>,
}

impl OutgoingMessage {
    /// Plain-text message without attachments.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            content: MessageContent::Text(body.into()),
            attachments: Vec::new(),
        }
    }
}

/// Result of `send_message`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The backend accepted the message.
    Confirmed {
        /// Optimistic id used while sending.
        local_id: MessageId,
        /// Server-assigned id now stored.
        server_id: MessageId,
    },
    /// The send failed; the local copy is marked `Error`.
    Failed {
        /// Optimistic id of the failed message.
        local_id: MessageId,
        /// Error text.
        reason: String,
    },
}

/// What `dispatch` did with an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A new message was appended.
    Appended,
    /// A server echo replaced its optimistic original.
    Reconciled,
    /// The message id was already stored.
    Duplicate,
    /// A notification was added.
    Notified,
    /// The notification id was already listed.
    DuplicateNotification,
}

/// Client-side sync engine: stores, tag correlator and transport in one place.
pub struct SyncEngine {
    config: SyncConfig,
    messages: Arc<MessageStore>,
    notifications: Arc<NotificationStore>,
    tags: TagCorrelator,
    transport: Arc<dyn ChatTransport>,
}

impl SyncEngine {
    /// Create a new sync engine.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: SyncConfig, backends: SyncBackends) -> SyncResult<Self> {
        config.validate()?;
        let messages = Arc::new(MessageStore::from_config(&config)?);
        let notifications = Arc::new(NotificationStore::new());
        let tags = TagCorrelator::new(backends.side_store, config.tags.storage_key.clone());

        info!(
            local_user = ?config.identity.local_user_id,
            max_conversations = config.store.max_conversations,
            restored_tags = tags.len(),
            "Sync engine started"
        );

        Ok(Self {
            config,
            messages,
            notifications,
            tags,
            transport: backends.transport,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Conversation store.
    #[must_use]
    pub const fn messages(&self) -> &Arc<MessageStore> {
        &self.messages
    }

    /// Notification store.
    #[must_use]
    pub const fn notifications(&self) -> &Arc<NotificationStore> {
        &self.notifications
    }

    /// Interaction tag correlator.
    #[must_use]
    pub const fn tags(&self) -> &TagCorrelator {
        &self.tags
    }

    fn local_user_id(&self) -> Option<&str> {
        self.config.identity.local_user_id.as_deref()
    }

    /// Route one inbound event into the stores.
    pub fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        match event {
            InboundEvent::Message {
                conversation_id,
                mut message,
            } => {
                if message.conversation_id.is_empty() {
                    message.conversation_id = conversation_id.clone();
                }
                self.tags.observe(&conversation_id, &message);
                self.dispatch_message(&conversation_id, message)
            }
            InboundEvent::Notification {
                conversation_id,
                notification,
            } => {
                if self.notifications.add_notification(&conversation_id, notification) {
                    DispatchOutcome::Notified
                } else {
                    DispatchOutcome::DuplicateNotification
                }
            }
        }
    }

    fn dispatch_message(&self, conversation_id: &ConversationId, message: Message) -> DispatchOutcome {
        // A redelivered echo must not claim another pending send.
        if self.messages.contains_message(conversation_id, &message.id) {
            debug!(conversation = %conversation_id, message = %message.id, "Dropped redelivered message");
            return DispatchOutcome::Duplicate;
        }

        if message.is_authored_by(self.local_user_id()) {
            let window = self.config.reconcile.optimistic_window_ms;
            if let Some(pending_id) = self
                .messages
                .find_pending_echo(conversation_id, &message, window)
            {
                debug!(
                    conversation = %conversation_id,
                    local_id = %pending_id,
                    server_id = %message.id,
                    "Reconciled optimistic message with server echo"
                );
                self.messages.update_message(
                    conversation_id,
                    &pending_id,
                    MessagePatch::from_confirmed(message),
                );
                return DispatchOutcome::Reconciled;
            }
        }

        if self.messages.on_new_message(conversation_id, message) {
            DispatchOutcome::Appended
        } else {
            DispatchOutcome::Duplicate
        }
    }

    /// Send a message with optimistic local insertion.
    ///
    /// The message shows up immediately with status `Sending`. On success it
    /// takes the server id; on failure it stays in place with status `Error`.
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        outgoing: OutgoingMessage,
    ) -> SendOutcome {
        let pending = Message::optimistic(
            conversation_id.clone(),
            self.config.identity.local_user_id.clone(),
            outgoing.content,
            outgoing.attachments,
        );
        let local_id = pending.id.clone();
        let payload = SendPayload {
            conversation_id: conversation_id.clone(),
            client_message_id: local_id.clone(),
            sender_id: pending.sender_id.clone(),
            content: pending.content.clone(),
            attachments: pending.attachments.clone(),
            i_tag: self.tags.get_latest(conversation_id),
        };
        self.messages.add_message_to_chat(conversation_id, pending);

        let result = self
            .transport
            .send_message(payload)
            .await
            .and_then(ApiResponse::into_result);

        match result {
            Ok(receipt) => {
                let server_id = receipt.id;
                let promoted = self.messages.update_message(
                    conversation_id,
                    &local_id,
                    MessagePatch::confirmed(server_id.clone()),
                );
                if !promoted {
                    debug!(local_id = %local_id, "Optimistic message already reconciled");
                }
                debug!(conversation = %conversation_id, server_id = %server_id, "Message sent");
                SendOutcome::Confirmed {
                    local_id,
                    server_id,
                }
            }
            Err(error) => {
                warn!(
                    conversation = %conversation_id,
                    local_id = %local_id,
                    error = %error,
                    "Failed to send message"
                );
                self.messages.update_message(
                    conversation_id,
                    &local_id,
                    MessagePatch::status(MessageStatus::Error),
                );
                SendOutcome::Failed {
                    local_id,
                    reason: error.to_string(),
                }
            }
        }
    }

    /// Switch the active conversation, then clear its unread state.
    pub fn activate_conversation(&self, conversation_id: Option<&ConversationId>) {
        self.messages
            .set_active_conversation(conversation_id.cloned());
        if let Some(id) = conversation_id {
            self.messages.mark_as_read(id);
            self.notifications.mark_as_read(id);
        }
        info!(conversation = ?conversation_id, "Active conversation changed");
    }

    /// Mark every stored message of a conversation as read.
    ///
    /// The local counter is reset even if the backend call fails. Returns
    /// whether the backend acknowledged the marker.
    pub async fn mark_conversation_read(&self, conversation_id: &ConversationId, reader_id: &str) -> bool {
        let ids: Vec<MessageId> = self
            .messages
            .get_messages(conversation_id)
            .into_iter()
            .map(|message| message.id)
            .collect();

        let acknowledged = if ids.is_empty() {
            true
        } else {
            match self
                .transport
                .mark_read(ids, reader_id.to_string())
                .await
                .and_then(ApiResponse::into_result)
            {
                Ok(receipt) => {
                    debug!(
                        conversation = %conversation_id,
                        updated = receipt.updated_ids.len(),
                        "Marked conversation read"
                    );
                    true
                }
                Err(error) => {
                    warn!(conversation = %conversation_id, error = %error, "Failed to mark conversation read");
                    false
                }
            }
        };

        self.messages.mark_as_read(conversation_id);
        acknowledged
    }

    /// Messages of a conversation with near-duplicates collapsed for display.
    #[must_use]
    pub fn render_messages(&self, conversation_id: &ConversationId) -> Vec<Message> {
        dedupe_for_render(
            &self.messages.get_messages(conversation_id),
            self.config.reconcile.render_window_ms,
        )
    }

    /// Pager over older history, bound to this engine's store and transport.
    #[must_use]
    pub fn thread_pager(&self) -> ThreadPager {
        ThreadPager::new(
            Arc::clone(&self.messages),
            Arc::clone(&self.transport),
            &self.config.pagination,
        )
    }

    /// Notification feed pager, bound to this engine's store and transport.
    #[must_use]
    pub fn notification_feed(&self) -> NotificationFeed {
        NotificationFeed::new(
            Arc::clone(&self.notifications),
            Arc::clone(&self.transport),
            &self.config.pagination,
        )
    }
}
