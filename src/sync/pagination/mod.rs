//! History and notification pagination.

pub mod merge;
pub mod notification_feed;
pub mod request_slot;
pub mod scroll;
pub mod thread_pager;

pub use merge::{merge_messages, merge_notifications, page_has_more};
pub use notification_feed::{AutoFillReport, NotificationFeed};
pub use request_slot::{InFlight, RequestSlot};
pub use scroll::{ScrollAnchor, ScrollMetrics, ViewportProbe};
pub use thread_pager::{LoadOutcome, PageLoad, ThreadPager};
