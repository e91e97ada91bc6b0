//! In-process chat backend used by the binary and the tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::ids::{ConversationId, MessageId, now_millis};
use crate::sync::core::message::{Message, Role};
use crate::sync::core::notification::Notification;
use crate::sync::transport::client::{
    ApiResponse, ChatTransport, FetchRequest, MarkReadReceipt, SendPayload, SendReceipt,
    TransportFuture,
};

#[derive(Default)]
struct ServerState {
    history: HashMap<ConversationId, Vec<Message>>,
    notifications: HashMap<ConversationId, Vec<Notification>>,
    sent: Vec<SendPayload>,
    read_markers: Vec<(MessageId, String)>,
    offline: bool,
    unreachable: bool,
    gate: Option<Arc<Notify>>,
}

/// Chat backend kept in memory.
///
/// History is stored oldest first and served newest first when the request
/// asks for `reverse`. Notifications are stored newest first.
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<ServerState>,
    fetch_calls: AtomicUsize,
    notification_calls: AtomicUsize,
    next_server_id: AtomicUsize,
}

impl MemoryTransport {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append messages to the server-side history of a conversation.
    pub fn seed_messages(&self, id: &ConversationId, messages: Vec<Message>) {
        let mut state = self.lock_state();
        let history = state.history.entry(id.clone()).or_default();
        history.extend(messages);
        history.sort_by_key(|m| m.created_at);
    }

    /// Add notifications to the server-side feed of a conversation.
    pub fn seed_notifications(&self, id: &ConversationId, notifications: Vec<Notification>) {
        let mut state = self.lock_state();
        let feed = state.notifications.entry(id.clone()).or_default();
        feed.extend(notifications);
        feed.sort_by(|a, b| b.time.cmp(&a.time));
    }

    /// Answer every call with `success: false`.
    pub fn set_offline(&self, offline: bool) {
        self.lock_state().offline = offline;
    }

    /// Fail every call at the transport level.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock_state().unreachable = unreachable;
    }

    /// Park fetches until the returned handle is notified.
    ///
    /// Each `notify_one` releases one parked (or the next) fetch.
    pub fn hold_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock_state().gate = Some(Arc::clone(&gate));
        gate
    }

    /// Stop parking new fetches.
    pub fn release_fetches(&self) {
        if let Some(gate) = self.lock_state().gate.take() {
            gate.notify_waiters();
        }
    }

    /// Number of history fetches received.
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of notification fetches received.
    #[must_use]
    pub fn notification_calls(&self) -> usize {
        self.notification_calls.load(Ordering::SeqCst)
    }

    /// Payloads received by `send_message`.
    #[must_use]
    pub fn sent(&self) -> Vec<SendPayload> {
        self.lock_state().sent.clone()
    }

    /// Read markers received, as `(message id, reader id)`.
    #[must_use]
    pub fn read_markers(&self) -> Vec<(MessageId, String)> {
        self.lock_state().read_markers.clone()
    }

    async fn wait_gate(&self) {
        let gate = self.lock_state().gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn availability<T>(&self) -> Option<SyncResult<ApiResponse<T>>> {
        let state = self.lock_state();
        if state.unreachable {
            return Some(Err(SyncError::Transport("backend unreachable".to_string())));
        }
        if state.offline {
            return Some(Ok(ApiResponse::failure("backend offline")));
        }
        None
    }
}

fn window<T: Clone>(items: &[T], request: &FetchRequest, newest_last: bool) -> Vec<T> {
    if request.reverse && newest_last {
        items
            .iter()
            .rev()
            .skip(request.offset)
            .take(request.limit)
            .cloned()
            .collect()
    } else {
        items
            .iter()
            .skip(request.offset)
            .take(request.limit)
            .cloned()
            .collect()
    }
}

impl ChatTransport for MemoryTransport {
    fn fetch_messages(
        &self,
        request: FetchRequest,
    ) -> TransportFuture<'_, SyncResult<ApiResponse<Vec<Message>>>> {
        Box::pin(async move {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_gate().await;
            if let Some(response) = self.availability() {
                return response;
            }

            let state = self.lock_state();
            let page = state
                .history
                .get(&request.conversation_id)
                .map(|history| window(history, &request, true))
                .unwrap_or_default();
            drop(state);
            Ok(ApiResponse::ok(page))
        })
    }

    fn fetch_notifications(
        &self,
        request: FetchRequest,
    ) -> TransportFuture<'_, SyncResult<ApiResponse<Vec<Notification>>>> {
        Box::pin(async move {
            self.notification_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_gate().await;
            if let Some(response) = self.availability() {
                return response;
            }

            let state = self.lock_state();
            let page = state
                .notifications
                .get(&request.conversation_id)
                .map(|feed| window(feed, &request, false))
                .unwrap_or_default();
            drop(state);
            Ok(ApiResponse::ok(page))
        })
    }

    fn send_message(
        &self,
        payload: SendPayload,
    ) -> TransportFuture<'_, SyncResult<ApiResponse<SendReceipt>>> {
        Box::pin(async move {
            if let Some(response) = self.availability() {
                return response;
            }

            let number = self.next_server_id.fetch_add(1, Ordering::SeqCst) + 1;
            let id = MessageId::new(format!("srv_{number}"));
            let created_at = now_millis();

            let mut stored = Message::new(
                id.clone(),
                payload.conversation_id.clone(),
                Role::User,
                created_at,
                payload.content.clone(),
            );
            stored.sender_id.clone_from(&payload.sender_id);
            stored.attachments.clone_from(&payload.attachments);

            let mut state = self.lock_state();
            state
                .history
                .entry(payload.conversation_id.clone())
                .or_default()
                .push(stored);
            state.sent.push(payload);
            drop(state);

            Ok(ApiResponse::ok(SendReceipt {
                id,
                created_at: Some(created_at),
            }))
        })
    }

    fn mark_read(
        &self,
        message_ids: Vec<MessageId>,
        reader_id: String,
    ) -> TransportFuture<'_, SyncResult<ApiResponse<MarkReadReceipt>>> {
        Box::pin(async move {
            if let Some(response) = self.availability() {
                return response;
            }

            let mut state = self.lock_state();
            state.read_markers.extend(
                message_ids
                    .iter()
                    .map(|id| (id.clone(), reader_id.clone())),
            );
            drop(state);
            Ok(ApiResponse::ok(MarkReadReceipt {
                updated_ids: message_ids,
            }))
        })
    }
}
