mod signaling;

pub use signaling::{PresenceEvent, SignalingTransport};
