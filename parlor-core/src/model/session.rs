use crate::model::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Negotiation state of a single peer connection, mirrored from the
/// underlying WebRTC connection object. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerConnectionState {
    /// Terminal or dead states after which the coordinator drops the peer.
    pub fn is_down(self) -> bool {
        matches!(
            self,
            PeerConnectionState::Disconnected
                | PeerConnectionState::Failed
                | PeerConnectionState::Closed
        )
    }
}

/// Top-level state of one voice session.
///
/// `Connected` means "joined the room"; per-peer bridging is tracked
/// separately through [`VoiceSessionState::connected_peers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Snapshot published by the session coordinator. Consumers observe it
/// through a watch channel and never mutate it directly.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSessionState {
    pub state: SessionState,
    pub error_message: Option<String>,
    pub muted: bool,
    pub connected_peers: BTreeSet<ParticipantId>,
}

impl VoiceSessionState {
    pub fn is_connected_to(&self, peer: &ParticipantId) -> bool {
        self.connected_peers.contains(peer)
    }
}

impl Default for VoiceSessionState {
    fn default() -> Self {
        Self {
            state: SessionState::Disconnected,
            error_message: None,
            muted: false,
            connected_peers: BTreeSet::new(),
        }
    }
}
