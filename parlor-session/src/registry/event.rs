use parlor_core::{ParticipantId, PeerConnectionState};
use std::sync::Arc;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::track::track_remote::TrackRemote;

/// Events emitted by the registry's connection callbacks, consumed by the
/// session coordinator on a single channel.
pub enum RegistryEvent {
    /// A local ICE candidate was discovered and must reach the remote peer
    /// through the signaling transport.
    CandidateReady {
        peer: ParticipantId,
        candidate: RTCIceCandidateInit,
    },

    /// The negotiated connection moved to a new state.
    StateChanged {
        peer: ParticipantId,
        state: PeerConnectionState,
    },

    /// The remote peer's audio arrived. Playback is the platform's job;
    /// the coordinator only records that the peer is bridged.
    TrackReceived {
        peer: ParticipantId,
        track: Arc<TrackRemote>,
    },
}
