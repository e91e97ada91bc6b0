//! Engine wiring stores, pagers, tags and transport.

pub mod core;

pub use self::core::{DispatchOutcome, OutgoingMessage, SendOutcome, SyncBackends, SyncEngine};
