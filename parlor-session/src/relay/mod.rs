mod client;
mod memory;

pub use client::{ChildEvent, ChildWatch, RelayClient};
pub use memory::{MemoryRelay, MemoryRelayClient};
