//! Observable in-memory stores.

pub mod message_store;
pub mod notification_store;
pub mod observable;

pub use message_store::{MessageSnapshot, MessageStore, PageMerge};
pub use notification_store::{NotificationSnapshot, NotificationStore};
pub use observable::{Listener, ListenerRegistry, Observable, Subscription};
