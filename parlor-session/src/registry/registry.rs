use crate::error::NegotiationError;
use crate::media::LocalAudioTrack;
use crate::registry::entry::PeerEntry;
use crate::registry::event::RegistryEvent;
use dashmap::DashMap;
use parlor_core::{IceServerConfig, ParticipantId, PeerConnectionState};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on candidates buffered for a peer with no entry yet.
const MAX_EARLY_CANDIDATES: usize = 16;

fn map_state(state: RTCPeerConnectionState) -> PeerConnectionState {
    match state {
        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => {
            PeerConnectionState::New
        }
        RTCPeerConnectionState::Connecting => PeerConnectionState::Connecting,
        RTCPeerConnectionState::Connected => PeerConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => PeerConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => PeerConnectionState::Failed,
        RTCPeerConnectionState::Closed => PeerConnectionState::Closed,
    }
}

/// Owns every negotiated connection of one session: at most one live entry
/// per peer id, a shared local audio track attached to each, and a single
/// event channel reporting candidates, state changes, and remote tracks.
pub struct PeerRegistry {
    api: webrtc::api::API,
    ice_servers: Vec<IceServerConfig>,
    peers: DashMap<ParticipantId, Arc<PeerEntry>>,
    // Candidates that raced ahead of the offer for a peer we have no entry
    // for yet; drained into the entry once negotiation starts.
    early_candidates: DashMap<ParticipantId, Vec<RTCIceCandidateInit>>,
    local_track: AsyncMutex<Option<LocalAudioTrack>>,
    event_tx: Mutex<mpsc::Sender<RegistryEvent>>,
}

impl PeerRegistry {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Result<Self, NegotiationError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(NegotiationError::Setup)?;
        let interceptors = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(NegotiationError::Setup)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptors)
            .build();

        // Placeholder sender; `subscribe` installs the live one before any
        // entry is created.
        let (event_tx, _) = mpsc::channel(1);

        Ok(Self {
            api,
            ice_servers,
            peers: DashMap::new(),
            early_candidates: DashMap::new(),
            local_track: AsyncMutex::new(None),
            event_tx: Mutex::new(event_tx),
        })
    }

    /// Replaces the event channel and returns its receiving half. Entries
    /// created afterwards report to the new channel, which lets a session
    /// rejoin after a leave with fresh event plumbing.
    pub fn subscribe(&self) -> mpsc::Receiver<RegistryEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        *self.event_tx.lock().unwrap_or_else(|e| e.into_inner()) = tx;
        rx
    }

    fn current_tx(&self) -> mpsc::Sender<RegistryEvent> {
        self.event_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn set_local_track(&self, track: LocalAudioTrack) {
        *self.local_track.lock().await = Some(track);
    }

    pub async fn local_track(&self) -> Option<LocalAudioTrack> {
        self.local_track.lock().await.clone()
    }

    pub fn contains(&self, peer: &ParticipantId) -> bool {
        self.peers.contains_key(peer)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn connection_state(&self, peer: &ParticipantId) -> Option<PeerConnectionState> {
        self.peers.get(peer).map(|entry| entry.connection_state())
    }

    /// Builds a fresh connection entry for `peer`, closing and replacing any
    /// stale one so the single-entry-per-peer guarantee holds.
    async fn create_entry(&self, peer: &ParticipantId) -> Result<Arc<PeerEntry>, NegotiationError> {
        self.close_peer(peer).await;

        let config = RTCConfiguration {
            ice_servers: self
                .ice_servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(
            self.api
                .new_peer_connection(config)
                .await
                .map_err(|source| NegotiationError::Create {
                    kind: "peer connection",
                    peer: peer.clone(),
                    source,
                })?,
        );

        if let Some(track) = self.local_track().await {
            pc.add_track(track.rtc_track())
                .await
                .map_err(|source| NegotiationError::Create {
                    kind: "audio sender",
                    peer: peer.clone(),
                    source,
                })?;
        }

        let state = Arc::new(Mutex::new(PeerConnectionState::New));
        let event_tx = self.current_tx();

        let state_tx = event_tx.clone();
        let state_slot = state.clone();
        let state_peer = peer.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let tx = state_tx.clone();
            let slot = state_slot.clone();
            let peer = state_peer.clone();

            Box::pin(async move {
                let mapped = map_state(s);
                info!(%peer, state = ?mapped, "peer connection state changed");
                *slot.lock().unwrap_or_else(|e| e.into_inner()) = mapped;
                let _ = tx
                    .send(RegistryEvent::StateChanged {
                        peer,
                        state: mapped,
                    })
                    .await;
            })
        }));

        let ice_tx = event_tx.clone();
        let ice_peer = peer.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let peer = ice_peer.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    warn!(%peer, "undecodable local candidate, skipped");
                    return;
                };
                let _ = tx
                    .send(RegistryEvent::CandidateReady {
                        peer,
                        candidate: init,
                    })
                    .await;
            })
        }));

        let track_tx = event_tx;
        let track_peer = peer.clone();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();
            let peer = track_peer.clone();

            Box::pin(async move {
                debug!(%peer, kind = %track.kind(), "remote track received");
                let _ = tx.send(RegistryEvent::TrackReceived { peer, track }).await;
            })
        }));

        let entry = Arc::new(PeerEntry::new(peer.clone(), pc, state));
        self.peers.insert(peer.clone(), entry.clone());

        if let Some((_, queued)) = self.early_candidates.remove(peer) {
            for candidate in queued {
                if let Err(e) = entry.apply_candidate(candidate).await {
                    warn!(%peer, error = %e, "buffered candidate rejected");
                }
            }
        }

        Ok(entry)
    }

    /// Starts negotiation towards `peer` and returns the local offer SDP.
    pub async fn create_offer(&self, peer: &ParticipantId) -> Result<String, NegotiationError> {
        let entry = self.create_entry(peer).await?;
        entry
            .create_offer()
            .await
            .map_err(|source| NegotiationError::Create {
                kind: "offer",
                peer: peer.clone(),
                source,
            })
    }

    /// Answers a received offer and returns the local answer SDP.
    pub async fn handle_offer(
        &self,
        peer: &ParticipantId,
        sdp: String,
    ) -> Result<String, NegotiationError> {
        let entry = self.create_entry(peer).await?;
        entry
            .apply_remote_offer(sdp)
            .await
            .map_err(|source| NegotiationError::Apply {
                kind: "offer",
                peer: peer.clone(),
                source,
            })?;
        entry
            .create_answer()
            .await
            .map_err(|source| NegotiationError::Create {
                kind: "answer",
                peer: peer.clone(),
                source,
            })
    }

    /// Applies a received answer. A missing entry is an expected race
    /// (stale or duplicate message) and only logged.
    pub async fn handle_answer(
        &self,
        peer: &ParticipantId,
        sdp: String,
    ) -> Result<(), NegotiationError> {
        let Some(entry) = self.peers.get(peer).map(|e| Arc::clone(e.value())) else {
            warn!(%peer, "answer for unknown peer, ignored");
            return Ok(());
        };
        entry
            .apply_remote_answer(sdp)
            .await
            .map_err(|source| NegotiationError::Apply {
                kind: "answer",
                peer: peer.clone(),
                source,
            })
    }

    /// Applies a received ICE candidate. Never fatal for an unknown peer:
    /// the candidate is buffered until negotiation starts, and queued
    /// inside the entry while the remote description is still pending.
    pub async fn add_remote_candidate(
        &self,
        peer: &ParticipantId,
        candidate: RTCIceCandidateInit,
    ) -> Result<(), NegotiationError> {
        let Some(entry) = self.peers.get(peer).map(|e| Arc::clone(e.value())) else {
            let mut queued = self.early_candidates.entry(peer.clone()).or_default();
            if queued.len() < MAX_EARLY_CANDIDATES {
                debug!(%peer, "buffering candidate for peer with no entry");
                queued.push(candidate);
            } else {
                debug!(%peer, "early candidate buffer full, candidate dropped");
            }
            return Ok(());
        };
        entry
            .apply_candidate(candidate)
            .await
            .map_err(|source| NegotiationError::Apply {
                kind: "candidate",
                peer: peer.clone(),
                source,
            })
    }

    /// Closes and removes the entry for `peer`. Idempotent.
    pub async fn close_peer(&self, peer: &ParticipantId) {
        self.early_candidates.remove(peer);
        let Some((_, entry)) = self.peers.remove(peer) else {
            return;
        };
        if let Err(e) = entry.close().await {
            warn!(%peer, error = %e, "error closing peer connection");
        }
    }

    /// Closes every entry and releases the local audio track. Called once
    /// at session teardown.
    pub async fn dispose_all(&self) {
        let peers: Vec<ParticipantId> = self.peers.iter().map(|e| e.key().clone()).collect();
        for peer in peers {
            self.close_peer(&peer).await;
        }
        self.early_candidates.clear();
        self.local_track.lock().await.take();
    }
}
