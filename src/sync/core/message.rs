//! Message model shared by the stores, pagers and transport.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::sync::core::ids::{ConversationId, MessageId, generate_id, now_millis};

/// Prefix of ids minted for locally composed messages.
pub const OPTIMISTIC_PREFIX: &str = "user_msg";

/// Author role of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human on this device (or another human in a group chat).
    User,
    /// Model response.
    Assistant,
    /// System notice.
    System,
    /// Autonomous agent participant.
    Agent,
}

impl Role {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Agent => "agent",
        }
    }

    /// Prefix used when a message of this role needs a generated id.
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::User => OPTIMISTIC_PREFIX,
            Self::Assistant => "assistant_msg",
            Self::System => "system_msg",
            Self::Agent => "agent_msg",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            "agent" => Ok(Self::Agent),
            _ => Err(value.to_string()),
        }
    }
}

/// Delivery status of a message.
///
/// The stores never look at `Loading` or `Incomplete`; they are carried
/// through for the thread view.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Optimistically inserted, not yet confirmed.
    Sending,
    /// Confirmed by the server.
    #[default]
    Complete,
    /// Send failed.
    Error,
    /// Upstream is still producing content.
    Loading,
    /// Upstream stopped before finishing.
    Incomplete,
}

/// Message payload.
///
/// Known kinds get their own variant; anything else is kept verbatim in
/// `Opaque` so renderers outside this crate can still reach it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Markdown text.
    Markdown(String),
    /// Interactive form definition.
    Form(Value),
    /// Rich card.
    Card(Value),
    /// Unknown kind, raw payload.
    Opaque(Value),
}

impl MessageContent {
    /// Build content from a raw JSON value.
    ///
    /// A bare string is text; `{"type": <known>, "data": ...}` maps to the
    /// matching variant; everything else becomes `Opaque`.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            Value::Object(mut map) => {
                let kind = map.get("type").and_then(Value::as_str).map(str::to_owned);
                match (kind.as_deref(), map.remove("data")) {
                    (Some("text"), Some(Value::String(text))) => Self::Text(text),
                    (Some("markdown"), Some(Value::String(text))) => Self::Markdown(text),
                    (Some("form"), Some(data)) => Self::Form(data),
                    (Some("card"), Some(data)) => Self::Card(data),
                    (Some("opaque"), Some(data)) => Self::Opaque(data),
                    (_, data) => {
                        if let Some(data) = data {
                            map.insert("data".to_string(), data);
                        }
                        Self::Opaque(Value::Object(map))
                    }
                }
            }
            other => Self::Opaque(other),
        }
    }

    /// Text body for text-like content.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) | Self::Markdown(text) => Some(text),
            Self::Form(_) | Self::Card(_) | Self::Opaque(_) => None,
        }
    }

    /// Structured view of the content.
    ///
    /// JSON payload variants are returned as-is. Text is parsed only when it
    /// looks like a JSON object; plain text yields `None`, never an error.
    #[must_use]
    pub fn structured(&self) -> Option<Cow<'_, Value>> {
        match self {
            Self::Text(text) | Self::Markdown(text) => {
                if !text.trim_start().starts_with('{') {
                    return None;
                }
                serde_json::from_str::<Value>(text)
                    .ok()
                    .filter(Value::is_object)
                    .map(Cow::Owned)
            }
            Self::Form(value) | Self::Card(value) | Self::Opaque(value) => {
                Some(Cow::Borrowed(value))
            }
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl<'de> Deserialize<'de> for MessageContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

/// Opaque attachment payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attachment(pub Value);

/// A chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message id; may be empty on malformed input until `ensure_id` runs.
    #[serde(default)]
    pub id: MessageId,
    /// Conversation the message belongs to; filled from the event when absent.
    #[serde(default)]
    pub conversation_id: ConversationId,
    /// Author role.
    pub role: Role,
    /// Author id in multi-party conversations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    /// Author display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Creation time in epoch milliseconds; the ordering key.
    pub created_at: i64,
    /// Payload.
    #[serde(default)]
    pub content: MessageContent,
    /// Delivery status.
    #[serde(default)]
    pub status: MessageStatus,
    /// Attachments in display order.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Build a confirmed message.
    #[must_use]
    pub fn new(
        id: impl Into<MessageId>,
        conversation_id: impl Into<ConversationId>,
        role: Role,
        created_at: i64,
        content: MessageContent,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            role,
            sender_id: None,
            sender_name: None,
            created_at,
            content,
            status: MessageStatus::Complete,
            attachments: Vec::new(),
        }
    }

    /// Build a locally composed message awaiting server confirmation.
    #[must_use]
    pub fn optimistic(
        conversation_id: ConversationId,
        sender_id: Option<String>,
        content: MessageContent,
        attachments: Vec<Attachment>,
    ) -> Self {
        Self {
            id: MessageId::new(generate_id(OPTIMISTIC_PREFIX)),
            conversation_id,
            role: Role::User,
            sender_id,
            sender_name: None,
            created_at: now_millis(),
            content,
            status: MessageStatus::Sending,
            attachments,
        }
    }

    /// Set the sender id.
    #[must_use]
    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    /// Set the status.
    #[must_use]
    pub const fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether the local user wrote this message.
    ///
    /// An explicit sender id decides; without one, only `User` messages count
    /// as local.
    #[must_use]
    pub fn is_authored_by(&self, local_user_id: Option<&str>) -> bool {
        match self.sender_id.as_deref() {
            Some(sender) => local_user_id == Some(sender),
            None => self.role == Role::User,
        }
    }

    /// Whether the id was minted on this client.
    #[must_use]
    pub fn is_optimistic(&self) -> bool {
        self.id
            .as_str()
            .strip_prefix(OPTIMISTIC_PREFIX)
            .is_some_and(|rest| rest.starts_with('_'))
    }
}

/// Partial update applied by `update_message`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessagePatch {
    /// New id (server confirmation).
    pub id: Option<MessageId>,
    /// New status.
    pub status: Option<MessageStatus>,
    /// New content.
    pub content: Option<MessageContent>,
    /// New creation time.
    pub created_at: Option<i64>,
    /// New attachments.
    pub attachments: Option<Vec<Attachment>>,
    /// New sender id.
    pub sender_id: Option<String>,
    /// New sender display name.
    pub sender_name: Option<String>,
}

impl MessagePatch {
    /// Promote an optimistic message to its server id.
    #[must_use]
    pub fn confirmed(id: MessageId) -> Self {
        Self {
            id: Some(id),
            status: Some(MessageStatus::Complete),
            ..Self::default()
        }
    }

    /// Only change the status.
    #[must_use]
    pub fn status(status: MessageStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Take every field from a server-confirmed copy of the message.
    #[must_use]
    pub fn from_confirmed(message: Message) -> Self {
        Self {
            id: Some(message.id),
            status: Some(message.status),
            content: Some(message.content),
            created_at: Some(message.created_at),
            attachments: Some(message.attachments),
            sender_id: message.sender_id,
            sender_name: message.sender_name,
        }
    }

    /// Merge the patch into `message`.
    pub fn apply(self, message: &mut Message) {
        if let Some(id) = self.id {
            message.id = id;
        }
        if let Some(status) = self.status {
            message.status = status;
        }
        if let Some(content) = self.content {
            message.content = content;
        }
        if let Some(created_at) = self.created_at {
            message.created_at = created_at;
        }
        if let Some(attachments) = self.attachments {
            message.attachments = attachments;
        }
        if let Some(sender_id) = self.sender_id {
            message.sender_id = Some(sender_id);
        }
        if let Some(sender_name) = self.sender_name {
            message.sender_name = Some(sender_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_string_content_is_text() {
        let content: MessageContent = serde_json::from_value(json!("hello")).unwrap();
        assert_eq!(content, MessageContent::Text("hello".to_string()));
    }

    #[test]
    fn test_unknown_kind_is_opaque() {
        let raw = json!({"type": "chart", "data": {"points": [1, 2]}});
        let content: MessageContent = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(content, MessageContent::Opaque(raw));
    }

    #[test]
    fn test_known_kind_roundtrip() {
        let content = MessageContent::Card(json!({"title": "t"}));
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json, json!({"type": "card", "data": {"title": "t"}}));
        let back: MessageContent = serde_json::from_value(json).unwrap();
        assert_eq!(back, content);
    }

    #[test]
    fn test_structured_skips_plain_text() {
        assert!(MessageContent::Text("hi {there}".to_string()).structured().is_none());
        assert!(MessageContent::Text("{not json".to_string()).structured().is_none());
        let parsed = MessageContent::Text(r#"{"i_tag": "t1"}"#.to_string());
        assert_eq!(
            parsed.structured().map(Cow::into_owned),
            Some(json!({"i_tag": "t1"}))
        );
    }

    #[test]
    fn test_message_wire_format_is_camel_case() {
        let raw = json!({
            "id": "m1",
            "conversationId": "c1",
            "role": "assistant",
            "createdAt": 42,
            "content": "hi"
        });
        let message: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(message.conversation_id.as_str(), "c1");
        assert_eq!(message.created_at, 42);
        assert_eq!(message.status, MessageStatus::Complete);
    }

    #[test]
    fn test_missing_id_deserializes_empty() {
        let raw = json!({"conversationId": "c1", "role": "user", "createdAt": 1});
        let message: Message = serde_json::from_value(raw).unwrap();
        assert!(message.id.is_empty());
    }

    #[test]
    fn test_authorship() {
        let mine = Message::new("a", "c", Role::User, 1, MessageContent::default());
        assert!(mine.is_authored_by(None));

        let theirs = mine.clone().with_sender("bob");
        assert!(!theirs.is_authored_by(Some("me")));
        assert!(theirs.is_authored_by(Some("bob")));

        let bot = Message::new("b", "c", Role::Assistant, 1, MessageContent::default());
        assert!(!bot.is_authored_by(Some("me")));
    }

    #[test]
    fn test_optimistic_message() {
        let message = Message::optimistic(
            ConversationId::from("c1"),
            None,
            MessageContent::Text("x".to_string()),
            Vec::new(),
        );
        assert!(message.is_optimistic());
        assert_eq!(message.status, MessageStatus::Sending);
        assert!(!Message::new("user_msgx", "c", Role::User, 0, MessageContent::default())
            .is_optimistic());
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut message = Message::new("tmp1", "c1", Role::User, 100, MessageContent::default())
            .with_status(MessageStatus::Sending);
        MessagePatch::confirmed(MessageId::from("srv1")).apply(&mut message);
        assert_eq!(message.id.as_str(), "srv1");
        assert_eq!(message.status, MessageStatus::Complete);
        assert_eq!(message.created_at, 100);
    }
}
