pub mod model;

pub use model::{
    IceServerConfig, ParticipantId, ParticipantRecord, PeerConnectionState, RoomId, SessionState,
    SignalKind, SignalMessage, SignalPayload, VoiceSessionState,
};
