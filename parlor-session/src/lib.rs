//! Voice-chat session layer: WebRTC signaling over a shared relay store,
//! per-peer connection lifecycle, and a joinable session coordinator.

pub mod error;
pub mod media;
pub mod registry;
pub mod relay;
pub mod session;
pub mod transport;

pub use error::{MediaError, NegotiationError, SessionError, TransportError};
pub use media::{AudioConstraints, AudioSource, LocalAudioTrack, SilenceSource};
pub use registry::{PeerRegistry, RegistryEvent};
pub use relay::{ChildEvent, ChildWatch, MemoryRelay, MemoryRelayClient, RelayClient};
pub use session::{VoiceSession, VoiceSessionConfig, default_stun_servers};
pub use transport::{PresenceEvent, SignalingTransport};
