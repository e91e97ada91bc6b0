//! Inbound events, their pump, and message identity helpers.

pub mod dedupe;
pub mod event_pump;
pub mod inbound_event;

pub use dedupe::{
    dedupe_for_render, ensure_id, ensure_notification_id, find_optimistic_match, is_duplicate,
    is_render_duplicate, matches_optimistic, normalize_text, same_content,
};
pub use event_pump::spawn_event_pump;
pub use inbound_event::InboundEvent;
