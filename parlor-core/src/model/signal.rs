use crate::model::participant::{ParticipantId, unix_millis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Body of a signaling event, tagged on the wire by operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum SignalPayload {
    Offer {
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    Candidate {
        candidate: String,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u16>,
    },
    Leave,
}

impl SignalPayload {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalPayload::Offer { .. } => SignalKind::Offer,
            SignalPayload::Answer { .. } => SignalKind::Answer,
            SignalPayload::Candidate { .. } => SignalKind::Candidate,
            SignalPayload::Leave => SignalKind::Leave,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
    Leave,
}

/// One addressed signaling event, appended to `rooms/{room}/signals/{auto}`
/// and consumed exactly once by the addressee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalMessage {
    pub from: ParticipantId,
    pub to: ParticipantId,
    #[serde(flatten)]
    pub payload: SignalPayload,
    pub sent_at: u64,
}

impl SignalMessage {
    /// Invariant: `from != to`. A participant never signals itself.
    pub fn new(from: ParticipantId, to: ParticipantId, payload: SignalPayload) -> Self {
        debug_assert_ne!(from, to, "signal addressed to its own sender");
        Self {
            from,
            to,
            payload,
            sent_at: unix_millis(),
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.payload.kind()
    }
}
