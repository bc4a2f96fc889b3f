use parlor_core::{ParticipantId, PeerConnectionState};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// One negotiated connection to a remote participant. Owned exclusively by
/// the [`super::PeerRegistry`]; never reused after `close`.
pub struct PeerEntry {
    pub peer_id: ParticipantId,
    pc: Arc<RTCPeerConnection>,
    state: Arc<Mutex<PeerConnectionState>>,
    // Remote candidates can race ahead of the answer; they are queued here
    // and drained once the remote description lands.
    pending_candidates: AsyncMutex<Vec<RTCIceCandidateInit>>,
}

impl PeerEntry {
    pub(crate) fn new(
        peer_id: ParticipantId,
        pc: Arc<RTCPeerConnection>,
        state: Arc<Mutex<PeerConnectionState>>,
    ) -> Self {
        Self {
            peer_id,
            pc,
            state,
            pending_candidates: AsyncMutex::new(Vec::new()),
        }
    }

    pub fn connection_state(&self) -> PeerConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Generates and installs the local offer, returning its SDP.
    pub async fn create_offer(&self) -> Result<String, webrtc::Error> {
        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer.clone()).await?;
        Ok(offer.sdp)
    }

    /// Generates and installs the local answer, returning its SDP.
    pub async fn create_answer(&self) -> Result<String, webrtc::Error> {
        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer.clone()).await?;
        Ok(answer.sdp)
    }

    pub async fn apply_remote_offer(&self, sdp: String) -> Result<(), webrtc::Error> {
        let desc = RTCSessionDescription::offer(sdp)?;
        self.pc.set_remote_description(desc).await?;
        self.drain_pending_candidates().await;
        Ok(())
    }

    pub async fn apply_remote_answer(&self, sdp: String) -> Result<(), webrtc::Error> {
        let desc = RTCSessionDescription::answer(sdp)?;
        self.pc.set_remote_description(desc).await?;
        self.drain_pending_candidates().await;
        Ok(())
    }

    /// Applies a remote candidate, or queues it while no remote description
    /// is set yet.
    pub async fn apply_candidate(&self, candidate: RTCIceCandidateInit) -> Result<(), webrtc::Error> {
        if self.pc.remote_description().await.is_none() {
            debug!(peer = %self.peer_id, "queueing early remote candidate");
            self.pending_candidates.lock().await.push(candidate);
            return Ok(());
        }
        self.pc.add_ice_candidate(candidate).await
    }

    async fn drain_pending_candidates(&self) {
        let queued = std::mem::take(&mut *self.pending_candidates.lock().await);
        for candidate in queued {
            if let Err(e) = self.pc.add_ice_candidate(candidate).await {
                warn!(peer = %self.peer_id, error = %e, "queued candidate rejected");
            }
        }
    }

    pub async fn close(&self) -> Result<(), webrtc::Error> {
        self.pc.close().await
    }
}
