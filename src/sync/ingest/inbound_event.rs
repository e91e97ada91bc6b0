//! Events pushed by the external event source.

use serde::{Deserialize, Serialize};

use crate::sync::core::ids::ConversationId;
use crate::sync::core::message::Message;
use crate::sync::core::notification::Notification;

/// An inbound event, already resolved to in-memory objects.
///
/// Delivery is at-least-once, so the same event may arrive more than once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A new chat message.
    Message {
        /// Target conversation.
        conversation_id: ConversationId,
        /// The message.
        message: Message,
    },
    /// A new agent notification.
    Notification {
        /// Target conversation.
        conversation_id: ConversationId,
        /// The notification.
        notification: Notification,
    },
}

impl InboundEvent {
    /// Conversation the event targets.
    #[must_use]
    pub const fn conversation_id(&self) -> &ConversationId {
        match self {
            Self::Message {
                conversation_id, ..
            }
            | Self::Notification {
                conversation_id, ..
            } => conversation_id,
        }
    }
}
