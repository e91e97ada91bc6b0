//! Message identity and deduplication helpers.
//!
//! Three notions of "the same message" exist:
//! - strict id equality, the only rule the stores enforce;
//! - optimistic-echo matching, used by the engine to reconcile a server
//!   echo with the locally inserted original;
//! - the render-layer near-duplicate check, exposed for views only.

use crate::sync::core::ids::{MessageId, NotificationId, generate_id};
use crate::sync::core::message::{Message, MessageContent, MessageStatus};
use crate::sync::core::notification::{NOTIFICATION_PREFIX, Notification};

/// Give `message` a generated id if it has none.
#[must_use]
pub fn ensure_id(mut message: Message) -> Message {
    if message.id.is_empty() {
        message.id = MessageId::new(generate_id(message.role.id_prefix()));
    }
    message
}

/// Give `notification` a generated id if it has none.
#[must_use]
pub fn ensure_notification_id(mut notification: Notification) -> Notification {
    if notification.id.is_empty() {
        notification.id = NotificationId::new(generate_id(NOTIFICATION_PREFIX));
    }
    notification
}

/// Strict identity: same id.
#[must_use]
pub fn is_duplicate(a: &Message, b: &Message) -> bool {
    a.id == b.id
}

/// Normalize text for comparison (trim, lowercase, collapse whitespace).
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut prev_space = false;

    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            if !prev_space {
                normalized.push(' ');
                prev_space = true;
            }
        } else {
            for lower in ch.to_lowercase() {
                normalized.push(lower);
            }
            prev_space = false;
        }
    }

    normalized
}

/// Content equality, lenient on whitespace and case for text bodies.
#[must_use]
pub fn same_content(a: &MessageContent, b: &MessageContent) -> bool {
    match (a.as_text(), b.as_text()) {
        (Some(left), Some(right)) => normalize_text(left) == normalize_text(right),
        _ => a == b,
    }
}

fn same_author(a: &Message, b: &Message) -> bool {
    a.role == b.role && a.sender_id == b.sender_id
}

const fn within_window(a: i64, b: i64, window_ms: i64) -> bool {
    a.abs_diff(b) <= window_ms.unsigned_abs()
}

/// Whether `confirmed` is the server echo of the optimistic `pending` message.
#[must_use]
pub fn matches_optimistic(pending: &Message, confirmed: &Message, window_ms: i64) -> bool {
    pending.status == MessageStatus::Sending
        && pending.is_optimistic()
        && pending.id != confirmed.id
        && pending.conversation_id == confirmed.conversation_id
        && pending.role == confirmed.role
        && (pending.sender_id.is_none()
            || confirmed.sender_id.is_none()
            || pending.sender_id == confirmed.sender_id)
        && same_content(&pending.content, &confirmed.content)
        && within_window(pending.created_at, confirmed.created_at, window_ms)
}

/// Find the optimistic original of `confirmed` in `messages`.
#[must_use]
pub fn find_optimistic_match<'a>(
    messages: &'a [Message],
    confirmed: &Message,
    window_ms: i64,
) -> Option<&'a Message> {
    messages
        .iter()
        .filter(|pending| matches_optimistic(pending, confirmed, window_ms))
        .min_by_key(|pending| pending.created_at.abs_diff(confirmed.created_at))
}

/// Render-layer near-duplicate check: same author and content within a window.
#[must_use]
pub fn is_render_duplicate(a: &Message, b: &Message, window_ms: i64) -> bool {
    is_duplicate(a, b)
        || (same_author(a, b)
            && within_window(a.created_at, b.created_at, window_ms)
            && same_content(&a.content, &b.content))
}

/// Collapse near-duplicates for display, keeping the first occurrence.
///
/// The stores never apply this; it is a view concern.
#[must_use]
pub fn dedupe_for_render(messages: &[Message], window_ms: i64) -> Vec<Message> {
    let mut kept: Vec<Message> = Vec::with_capacity(messages.len());
    for message in messages {
        if !kept
            .iter()
            .any(|existing| is_render_duplicate(existing, message, window_ms))
        {
            kept.push(message.clone());
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::core::ids::ConversationId;
    use crate::sync::core::message::Role;

    fn text(id: &str, role: Role, at: i64, body: &str) -> Message {
        Message::new(id, "c1", role, at, MessageContent::Text(body.to_string()))
    }

    #[test]
    fn test_ensure_id_fills_missing() {
        let message = text("", Role::Assistant, 1, "hi");
        let fixed = ensure_id(message);
        assert!(fixed.id.as_str().starts_with("assistant_msg_"));
    }

    #[test]
    fn test_ensure_id_keeps_existing() {
        let message = text("m1", Role::User, 1, "hi");
        assert_eq!(ensure_id(message).id.as_str(), "m1");
    }

    #[test]
    fn test_ensure_notification_id() {
        let fixed = ensure_notification_id(Notification::new("", "t", 1));
        assert!(fixed.id.as_str().starts_with("notification_"));
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello \n  World "), "hello world");
    }

    #[test]
    fn test_optimistic_match() {
        let pending = Message::optimistic(
            ConversationId::from("c1"),
            None,
            MessageContent::Text("ship it".to_string()),
            Vec::new(),
        );
        let mut echo = pending.clone();
        echo.id = MessageId::from("srv1");
        echo.status = MessageStatus::Complete;
        echo.created_at += 800;
        echo.content = MessageContent::Text("ship it ".to_string());
        assert!(matches_optimistic(&pending, &echo, 5_000));

        echo.created_at += 10_000;
        assert!(!matches_optimistic(&pending, &echo, 5_000));
    }

    #[test]
    fn test_confirmed_message_is_not_pending() {
        let a = text("srv1", Role::User, 1, "x");
        let b = text("srv2", Role::User, 1, "x");
        assert!(!matches_optimistic(&a, &b, 5_000));
    }

    #[test]
    fn test_render_duplicate_requires_same_author() {
        let a = text("a", Role::User, 1_000, "ok");
        let b = text("b", Role::Assistant, 1_500, "ok");
        let c = text("c", Role::User, 1_500, "OK");
        assert!(!is_render_duplicate(&a, &b, 2_000));
        assert!(is_render_duplicate(&a, &c, 2_000));
    }

    #[test]
    fn test_dedupe_for_render() {
        let messages = vec![
            text("a", Role::User, 1_000, "ok"),
            text("b", Role::User, 1_200, "ok"),
            text("c", Role::User, 9_000, "ok"),
            text("a", Role::User, 1_000, "ok"),
        ];
        let kept = dedupe_for_render(&messages, 2_000);
        let ids: Vec<&str> = kept.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
