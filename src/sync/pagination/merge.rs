//! Page merging for history and notification loads.

use std::collections::HashSet;

use crate::sync::core::ids::{MessageId, NotificationId};
use crate::sync::core::message::Message;
use crate::sync::core::notification::Notification;

/// Merge a fetched history page into the stored sequence.
///
/// Keyed by id; on collision the existing copy wins, since it may carry
/// local state the server page does not. Result is sorted ascending by
/// `created_at` (stable, so ties keep their relative order).
#[must_use]
pub fn merge_messages(existing: &[Message], page: Vec<Message>) -> Vec<Message> {
    let mut seen: HashSet<MessageId> = existing.iter().map(|m| m.id.clone()).collect();
    let mut merged = existing.to_vec();
    merged.extend(page.into_iter().filter(|m| seen.insert(m.id.clone())));
    merged.sort_by_key(|m| m.created_at);
    merged
}

/// Merge a fetched notification page behind the listed ones.
///
/// The current list keeps its order, live arrivals included; unseen page
/// items are appended at the tail, newest first.
#[must_use]
pub fn merge_notifications(existing: &[Notification], page: Vec<Notification>) -> Vec<Notification> {
    let mut seen: HashSet<NotificationId> = existing.iter().map(|n| n.id.clone()).collect();
    let mut tail: Vec<Notification> = page
        .into_iter()
        .filter(|n| seen.insert(n.id.clone()))
        .collect();
    tail.sort_by(|a, b| b.time.cmp(&a.time));

    let mut merged = existing.to_vec();
    merged.extend(tail);
    merged
}

/// A full page means there may be more; a short one ends pagination.
#[must_use]
pub const fn page_has_more(received: usize, page_size: usize) -> bool {
    received == page_size
}
