//! Core types: configuration, errors, identifiers and payload models.

pub mod config;
pub mod errors;
pub mod ids;
pub mod message;
pub mod notification;

pub use config::{
    IdentityConfig, PaginationConfig, ReconcileConfig, StoreConfig, SyncConfig, TagConfig,
};
pub use errors::{SyncError, SyncResult};
pub use ids::{ConversationId, MessageId, NotificationId, generate_id, now_millis};
pub use message::{
    Attachment, Message, MessageContent, MessagePatch, MessageStatus, OPTIMISTIC_PREFIX, Role,
};
pub use notification::{NOTIFICATION_PREFIX, Notification};
