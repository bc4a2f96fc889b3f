use crate::error::SessionError;
use crate::media::{AudioConstraints, AudioSource};
use crate::registry::{PeerRegistry, RegistryEvent};
use crate::relay::RelayClient;
use crate::transport::{PresenceEvent, SignalingTransport};
use parlor_core::{
    IceServerConfig, ParticipantId, PeerConnectionState, RoomId, SessionState, SignalMessage,
    SignalPayload, VoiceSessionState,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

/// No TURN relay is configured; traversal across symmetric NATs is out of
/// scope for now.
pub fn default_stun_servers() -> Vec<IceServerConfig> {
    vec![
        IceServerConfig::stun("stun:stun.l.google.com:19302"),
        IceServerConfig::stun("stun:stun1.l.google.com:19302"),
    ]
}

#[derive(Debug, Clone)]
pub struct VoiceSessionConfig {
    pub room: RoomId,
    pub participant: ParticipantId,
    pub display_name: String,
    pub ice_servers: Vec<IceServerConfig>,
    pub constraints: AudioConstraints,
}

impl VoiceSessionConfig {
    pub fn new(
        room: impl Into<RoomId>,
        participant: impl Into<ParticipantId>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            participant: participant.into(),
            display_name: display_name.into(),
            ice_servers: default_stun_servers(),
            constraints: AudioConstraints::default(),
        }
    }
}

/// Deterministic offer-initiation rule: of any two participants that
/// discover each other, the lexicographically smaller id sends the offer
/// and the other side answers. Applied both to the presence snapshot at
/// join time and to later join events, so two participants joining at the
/// same instant cannot end up in a double-offer exchange.
pub(crate) fn initiates(me: &ParticipantId, peer: &ParticipantId) -> bool {
    me < peer
}

struct SessionInner {
    room: RoomId,
    me: ParticipantId,
    display_name: String,
    constraints: AudioConstraints,
    transport: SignalingTransport,
    registry: PeerRegistry,
    audio: Arc<dyn AudioSource>,
    state_tx: watch::Sender<VoiceSessionState>,
}

impl SessionInner {
    fn publish(&self, f: impl FnOnce(&mut VoiceSessionState)) {
        self.state_tx.send_modify(f);
    }

    async fn send_signal(&self, to: &ParticipantId, payload: SignalPayload) {
        let msg = SignalMessage::new(self.me.clone(), to.clone(), payload);
        if let Err(e) = self.transport.send(&self.room, &msg).await {
            warn!(peer = %to, error = %e, "failed to send signal");
        }
    }

    /// Offers to `peer` if this side is the designated initiator and no
    /// connection entry exists yet.
    async fn maybe_offer(&self, peer: &ParticipantId) {
        if !initiates(&self.me, peer) {
            debug!(%peer, "peer initiates, waiting for its offer");
            return;
        }
        if self.registry.contains(peer) {
            return;
        }

        match self.registry.create_offer(peer).await {
            Ok(sdp) => self.send_signal(peer, SignalPayload::Offer { sdp }).await,
            Err(e) => {
                warn!(%peer, error = %e, "offer failed, dropping peer");
                self.registry.close_peer(peer).await;
            }
        }
    }

    async fn on_signal(&self, msg: SignalMessage) {
        let from = msg.from;
        match msg.payload {
            SignalPayload::Offer { sdp } => match self.registry.handle_offer(&from, sdp).await {
                Ok(answer) => {
                    self.send_signal(&from, SignalPayload::Answer { sdp: answer })
                        .await;
                }
                Err(e) => {
                    warn!(peer = %from, error = %e, "offer rejected, dropping peer");
                    self.registry.close_peer(&from).await;
                }
            },
            SignalPayload::Answer { sdp } => {
                if let Err(e) = self.registry.handle_answer(&from, sdp).await {
                    warn!(peer = %from, error = %e, "answer rejected, dropping peer");
                    self.registry.close_peer(&from).await;
                }
            }
            SignalPayload::Candidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            } => {
                let init = RTCIceCandidateInit {
                    candidate,
                    sdp_mid,
                    sdp_mline_index,
                    ..Default::default()
                };
                if let Err(e) = self.registry.add_remote_candidate(&from, init).await {
                    warn!(peer = %from, error = %e, "remote candidate rejected");
                }
            }
            SignalPayload::Leave => {
                info!(peer = %from, "peer announced leave");
                self.registry.close_peer(&from).await;
                self.publish(|s| {
                    s.connected_peers.remove(&from);
                });
            }
        }
    }

    async fn on_presence(&self, event: PresenceEvent) {
        match event {
            PresenceEvent::Joined(peer) => {
                info!(%peer, "participant joined room");
                self.maybe_offer(&peer).await;
            }
            PresenceEvent::Left(peer) => {
                info!(%peer, "participant left room");
                self.registry.close_peer(&peer).await;
                self.publish(|s| {
                    s.connected_peers.remove(&peer);
                });
            }
        }
    }

    async fn on_registry_event(&self, event: RegistryEvent) {
        match event {
            RegistryEvent::CandidateReady { peer, candidate } => {
                self.send_signal(&peer, SignalPayload::Candidate {
                    candidate: candidate.candidate,
                    sdp_mid: candidate.sdp_mid,
                    sdp_mline_index: candidate.sdp_mline_index,
                })
                .await;
            }
            RegistryEvent::StateChanged { peer, state } => {
                if state == PeerConnectionState::Connected {
                    self.publish(|s| {
                        s.connected_peers.insert(peer.clone());
                    });
                } else if state.is_down() {
                    // A replaced connection reports Closed after its
                    // successor is already live; trust the current entry.
                    let current = self.registry.connection_state(&peer);
                    if current.is_none_or(|c| c.is_down()) {
                        self.publish(|s| {
                            s.connected_peers.remove(&peer);
                        });
                    }
                }
            }
            RegistryEvent::TrackReceived { peer, .. } => {
                // Decoding and playback are the platform's concern.
                debug!(%peer, "remote audio track attached");
            }
        }
    }
}

/// Public entry point of the voice subsystem: one joinable room session
/// combining the signaling transport, the peer connection registry, and the
/// local audio capability. Session state is observable through a watch
/// channel and mutated only here.
pub struct VoiceSession {
    inner: Arc<SessionInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    active: AtomicBool,
    // Set once transport presence is registered; gates the leave broadcast
    // so a session that never entered the room stays silent on teardown.
    joined: AtomicBool,
}

impl VoiceSession {
    pub fn new(
        config: VoiceSessionConfig,
        relay: Arc<dyn RelayClient>,
        audio: Arc<dyn AudioSource>,
    ) -> Result<Self, SessionError> {
        let registry = PeerRegistry::new(config.ice_servers.clone())?;
        let (state_tx, _) = watch::channel(VoiceSessionState::default());

        Ok(Self {
            inner: Arc::new(SessionInner {
                room: config.room,
                me: config.participant,
                display_name: config.display_name,
                constraints: config.constraints,
                transport: SignalingTransport::new(relay),
                registry,
                audio,
                state_tx,
            }),
            tasks: Mutex::new(Vec::new()),
            active: AtomicBool::new(false),
            joined: AtomicBool::new(false),
        })
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.inner.me
    }

    pub fn watch_state(&self) -> watch::Receiver<VoiceSessionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn state(&self) -> VoiceSessionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Joins the room and starts negotiating with every present peer.
    ///
    /// Redundant calls while already connecting or connected are no-ops.
    /// On failure every partially acquired resource (capture track,
    /// presence record, observers) is released, and the session lands in
    /// the `Error` state with a message.
    pub async fn join_room(&self) -> Result<(), SessionError> {
        if self.active.swap(true, Ordering::SeqCst) {
            debug!(participant = %self.inner.me, "join ignored, session already active");
            return Ok(());
        }

        self.inner.publish(|s| {
            s.state = SessionState::Connecting;
            s.error_message = None;
        });

        match self.join_inner().await {
            Ok(()) => {
                self.inner.publish(|s| s.state = SessionState::Connected);
                info!(room = %self.inner.room, participant = %self.inner.me, "voice session up");
                Ok(())
            }
            Err(e) => {
                self.unwind().await;
                let message = e.to_string();
                self.inner.publish(|s| {
                    s.state = SessionState::Error;
                    s.error_message = Some(message);
                    s.connected_peers.clear();
                });
                self.active.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn join_inner(&self) -> Result<(), SessionError> {
        let inner = &self.inner;

        let track = inner.audio.open(&inner.constraints).await?;
        track.set_enabled(!inner.state_tx.borrow().muted);
        inner.registry.set_local_track(track).await;

        let registry_rx = inner.registry.subscribe();
        inner
            .transport
            .join(&inner.room, &inner.me, &inner.display_name)
            .await?;
        self.joined.store(true, Ordering::SeqCst);
        let incoming = inner.transport.observe_incoming(&inner.room, &inner.me).await?;
        let presence = inner.transport.observe_presence(&inner.room, &inner.me).await?;
        let present = inner.transport.list_present(&inner.room, &inner.me).await?;

        self.spawn_loops(registry_rx, incoming, presence, present);

        Ok(())
    }

    fn spawn_loops(
        &self,
        mut registry_rx: mpsc::Receiver<RegistryEvent>,
        mut incoming: mpsc::Receiver<SignalMessage>,
        mut presence: mpsc::Receiver<PresenceEvent>,
        present: Vec<ParticipantId>,
    ) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());

        let inner = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = registry_rx.recv().await {
                inner.on_registry_event(event).await;
            }
        }));

        let inner = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(msg) = incoming.recv().await {
                inner.on_signal(msg).await;
            }
        }));

        // Snapshot offers and presence deltas run on the same task: a peer
        // whose join lands between the observer attaching and the snapshot
        // being taken shows up in both, and interleaving the two paths
        // could offer to it twice, replacing a connection whose answer is
        // already in flight.
        let inner = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            for peer in present {
                inner.maybe_offer(&peer).await;
            }
            while let Some(event) = presence.recv().await {
                inner.on_presence(event).await;
            }
        }));
    }

    fn abort_tasks(&self) {
        for task in self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            task.abort();
        }
    }

    /// Handlers are cancelled first so nothing fires against resources
    /// mid-teardown.
    async fn unwind(&self) {
        self.abort_tasks();
        if self.joined.swap(false, Ordering::SeqCst) {
            if let Err(e) = self
                .inner
                .transport
                .leave(&self.inner.room, &self.inner.me)
                .await
            {
                debug!(error = %e, "transport leave during teardown failed");
            }
        }
        self.inner.registry.dispose_all().await;
    }

    /// Leaves the room and releases everything. Safe to call repeatedly,
    /// and safe after a `join_room` that never completed.
    pub async fn leave_room(&self) {
        self.unwind().await;
        self.inner.publish(|s| {
            s.state = SessionState::Disconnected;
            s.error_message = None;
            s.connected_peers.clear();
        });
        self.active.store(false, Ordering::SeqCst);
        info!(room = %self.inner.room, participant = %self.inner.me, "voice session down");
    }

    /// Mute is local to the capture track; no renegotiation or signaling
    /// happens and remote peers simply receive silence.
    pub async fn set_muted(&self, muted: bool) {
        if let Some(track) = self.inner.registry.local_track().await {
            track.set_enabled(!muted);
        }
        self.inner.publish(|s| s.muted = muted);
    }

    /// Flips the mute flag and returns the new value.
    pub async fn toggle_muted(&self) -> bool {
        let next = !self.inner.state_tx.borrow().muted;
        self.set_muted(next).await;
        next
    }
}
