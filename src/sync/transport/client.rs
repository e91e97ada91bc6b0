//! Transport contract between the sync layer and the chat backend.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::ids::{ConversationId, MessageId};
use crate::sync::core::message::{Attachment, Message, MessageContent};
use crate::sync::core::notification::Notification;

/// Boxed future type for transport calls.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Paged history request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    /// Conversation to read.
    pub conversation_id: ConversationId,
    /// Page size.
    pub limit: usize,
    /// Number of items already held by the client.
    pub offset: usize,
    /// Newest first on the server side.
    pub reverse: bool,
}

/// Response envelope used by every backend call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    pub success: bool,
    /// Payload on success.
    #[serde(default)]
    pub data: Option<T>,
    /// Error message on failure.
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed response.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Unwrap the envelope.
    ///
    /// # Errors
    /// Returns `SyncError::Rejected` if the backend reported a failure or
    /// sent no payload.
    pub fn into_result(self) -> SyncResult<T> {
        if !self.success {
            return Err(SyncError::Rejected(
                self.error.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| SyncError::Rejected("response carried no data".to_string()))
    }
}

/// Outgoing message as sent to the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPayload {
    /// Target conversation.
    pub conversation_id: ConversationId,
    /// Id of the optimistic local copy.
    pub client_message_id: MessageId,
    /// Local user id, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    /// Body.
    pub content: MessageContent,
    /// Attachments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Interaction tag to echo back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i_tag: Option<String>,
}

/// Server acknowledgement of a send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    /// Server-assigned id.
    pub id: MessageId,
    /// Server timestamp, if it differs from the local one.
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Server acknowledgement of a read marker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadReceipt {
    /// Messages whose read state changed.
    #[serde(default)]
    pub updated_ids: Vec<MessageId>,
}

/// Chat backend.
///
/// `Err` means the call never got an answer; a delivered failure comes back
/// as `Ok` with `success == false`.
pub trait ChatTransport: Send + Sync {
    /// Fetch a page of history.
    ///
    /// # Errors
    /// Returns an error if the backend is unreachable.
    fn fetch_messages(
        &self,
        request: FetchRequest,
    ) -> TransportFuture<'_, SyncResult<ApiResponse<Vec<Message>>>>;

    /// Fetch a page of notifications.
    ///
    /// # Errors
    /// Returns an error if the backend is unreachable.
    fn fetch_notifications(
        &self,
        request: FetchRequest,
    ) -> TransportFuture<'_, SyncResult<ApiResponse<Vec<Notification>>>>;

    /// Send a message.
    ///
    /// # Errors
    /// Returns an error if the backend is unreachable.
    fn send_message(
        &self,
        payload: SendPayload,
    ) -> TransportFuture<'_, SyncResult<ApiResponse<SendReceipt>>>;

    /// Mark messages as read for `reader_id`.
    ///
    /// # Errors
    /// Returns an error if the backend is unreachable.
    fn mark_read(
        &self,
        message_ids: Vec<MessageId>,
        reader_id: String,
    ) -> TransportFuture<'_, SyncResult<ApiResponse<MarkReadReceipt>>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_result() {
        assert_eq!(ApiResponse::ok(3).into_result().unwrap(), 3);
        let err = ApiResponse::<u8>::failure("nope").into_result().unwrap_err();
        assert!(matches!(err, SyncError::Rejected(reason) if reason == "nope"));
    }

    #[test]
    fn test_parse_envelope_without_data() {
        let raw = json!({"success": false, "error": "offline"});
        let response: ApiResponse<Vec<Message>> = serde_json::from_value(raw).unwrap();
        assert!(response.data.is_none());
        assert!(response.into_result().is_err());
    }

    #[test]
    fn test_fetch_request_wire_names() {
        let request = FetchRequest {
            conversation_id: ConversationId::from("c1"),
            limit: 20,
            offset: 40,
            reverse: true,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["conversationId"], "c1");
        assert_eq!(value["offset"], 40);
    }
}
