//! Out-of-band agent notification model.

use serde::{Deserialize, Serialize};

use crate::sync::core::ids::NotificationId;
use crate::sync::core::message::MessageContent;

/// Prefix used when a notification arrives without an id.
pub const NOTIFICATION_PREFIX: &str = "notification";

/// An agent notification shown in the notification feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification id.
    #[serde(default)]
    pub id: NotificationId,
    /// Short title.
    #[serde(default)]
    pub title: String,
    /// Payload, opaque to this crate.
    #[serde(default)]
    pub content: MessageContent,
    /// Time in epoch milliseconds.
    pub time: i64,
    /// Template kind.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Upstream status string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Notification {
    /// Build a notification.
    #[must_use]
    pub fn new(id: impl Into<NotificationId>, title: impl Into<String>, time: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: MessageContent::default(),
            time,
            kind: None,
            status: None,
        }
    }

    /// Set the content.
    #[must_use]
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content = content;
        self
    }
}
