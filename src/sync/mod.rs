//! Client-side synchronization layer for an agent chat.
//!
//! This module keeps a bounded, observable, in-memory picture of the
//! conversations a user takes part in, organized into:
//! - `core`: configuration, errors, ids, message and notification models
//! - `ingest`: inbound events, the event pump and identity/dedup helpers
//! - `store`: the observable conversation and notification stores
//! - `pagination`: page merging, request slots, thread and feed pagers
//! - `tags`: interaction-tag tracking over a durable side store
//! - `transport`: the backend contract and an in-memory backend
//! - `engine`: the service wiring everything together

pub mod core;
pub mod engine;
pub mod ingest;
pub mod pagination;
pub mod store;
pub mod tags;
pub mod transport;

pub use self::core::{
    Attachment, ConversationId, IdentityConfig, Message, MessageContent, MessageId, MessagePatch,
    MessageStatus, Notification, NotificationId, PaginationConfig, ReconcileConfig, Role,
    StoreConfig, SyncConfig, SyncError, SyncResult, TagConfig,
};
pub use engine::{DispatchOutcome, OutgoingMessage, SendOutcome, SyncBackends, SyncEngine};
pub use ingest::{InboundEvent, spawn_event_pump};
pub use pagination::{
    AutoFillReport, LoadOutcome, NotificationFeed, PageLoad, RequestSlot, ScrollAnchor,
    ScrollMetrics, ThreadPager, ViewportProbe,
};
pub use store::{
    MessageSnapshot, MessageStore, NotificationSnapshot, NotificationStore, Observable, PageMerge,
    Subscription,
};
pub use tags::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore, TagCorrelator};
pub use transport::{ApiResponse, ChatTransport, FetchRequest, MemoryTransport};
