//! Backend transport contract and the in-memory implementation.

pub mod client;
pub mod memory;

pub use client::{
    ApiResponse, ChatTransport, FetchRequest, MarkReadReceipt, SendPayload, SendReceipt,
    TransportFuture,
};
pub use memory::MemoryTransport;
