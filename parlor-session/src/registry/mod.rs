mod entry;
mod event;
mod registry;

pub use entry::PeerEntry;
pub use event::RegistryEvent;
pub use registry::PeerRegistry;
