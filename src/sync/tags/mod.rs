//! Interaction-tag tracking and its durable side store.

pub mod side_store;
pub mod tag_correlator;

pub use side_store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use tag_correlator::{TagCorrelator, extract_i_tag};
