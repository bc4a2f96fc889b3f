use parlor_core::ParticipantId;
use thiserror::Error;

/// Failures while talking to the signaling relay. These are recoverable from
/// the relay's point of view; the session coordinator decides whether to
/// surface them. The transport itself never retries.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("signaling relay unreachable: {0}")]
    Unreachable(String),

    #[error("relay write failed at {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("malformed payload at {path}: {source}")]
    Payload {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("signal addressed to its own sender")]
    SelfAddressed,
}

/// Failures opening the local audio capability.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("audio device unavailable: {0}")]
    Device(String),
}

/// Per-peer offer/answer/candidate failures. Isolated to the failing peer;
/// other connections are unaffected.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("webrtc api setup failed: {0}")]
    Setup(#[source] webrtc::Error),

    #[error("failed to create {kind} for {peer}: {source}")]
    Create {
        kind: &'static str,
        peer: ParticipantId,
        #[source]
        source: webrtc::Error,
    },

    #[error("failed to apply {kind} from {peer}: {source}")]
    Apply {
        kind: &'static str,
        peer: ParticipantId,
        #[source]
        source: webrtc::Error,
    },
}

/// Top-level session failure, surfaced through `VoiceSessionState::Error`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
}
