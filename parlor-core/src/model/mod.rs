mod participant;
mod room;
mod session;
mod signal;

pub use participant::{ParticipantId, ParticipantRecord};
pub use room::RoomId;
pub use session::{PeerConnectionState, SessionState, VoiceSessionState};
pub use signal::{IceServerConfig, SignalKind, SignalMessage, SignalPayload};
