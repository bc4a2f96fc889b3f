use crate::error::TransportError;
use crate::relay::{ChildEvent, RelayClient};
use parlor_core::{ParticipantId, ParticipantRecord, RoomId, SignalMessage, SignalPayload};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const OBSERVER_CHANNEL_CAPACITY: usize = 256;

/// Presence delta for a room, always excluding the observing participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    Joined(ParticipantId),
    Left(ParticipantId),
}

/// Addressed message delivery and room presence on top of a [`RelayClient`].
///
/// The transport owns every watch task it spawns and cancels them all
/// during [`SignalingTransport::leave`], after peers have been notified but
/// before the presence record disappears.
pub struct SignalingTransport {
    relay: Arc<dyn RelayClient>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SignalingTransport {
    pub fn new(relay: Arc<dyn RelayClient>) -> Self {
        Self {
            relay,
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn participants_path(room: &RoomId) -> String {
        format!("rooms/{room}/participants")
    }

    fn signals_path(room: &RoomId) -> String {
        format!("rooms/{room}/signals")
    }

    fn track(&self, task: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(task);
    }

    fn cancel_observers(&self) {
        for task in self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            task.abort();
        }
    }

    /// Registers presence for `me`. The disconnect cleanup is installed
    /// before the record is written, so there is no window in which a dead
    /// client leaves a record behind.
    pub async fn join(
        &self,
        room: &RoomId,
        me: &ParticipantId,
        display_name: &str,
    ) -> Result<(), TransportError> {
        let path = Self::participants_path(room);
        let record = ParticipantRecord::new(me.clone(), display_name);
        let value = serde_json::to_value(&record).map_err(|source| TransportError::Payload {
            path: path.clone(),
            source,
        })?;

        self.relay.on_disconnect_remove(&path, me.as_str()).await?;
        self.relay.put(&path, me.as_str(), value).await?;
        info!(%room, participant = %me, "joined signaling room");
        Ok(())
    }

    /// Current other participants. A best-effort snapshot, not consistent
    /// with concurrent joins.
    pub async fn list_present(
        &self,
        room: &RoomId,
        excluding: &ParticipantId,
    ) -> Result<Vec<ParticipantId>, TransportError> {
        let children = self.relay.children(&Self::participants_path(room)).await?;
        Ok(children
            .into_iter()
            .map(|(key, _)| ParticipantId::from(key))
            .filter(|id| id != excluding)
            .collect())
    }

    /// Live joined/left deltas for the room, excluding `me`. The stream ends
    /// only when the transport leaves or the relay connection drops.
    pub async fn observe_presence(
        &self,
        room: &RoomId,
        me: &ParticipantId,
    ) -> Result<mpsc::Receiver<PresenceEvent>, TransportError> {
        let mut watch = self
            .relay
            .watch(&Self::participants_path(room), false)
            .await?;
        let me = me.clone();
        let (tx, rx) = mpsc::channel(OBSERVER_CHANNEL_CAPACITY);

        let task = tokio::spawn(async move {
            while let Some(event) = watch.recv().await {
                let presence = match event {
                    ChildEvent::Added { key, .. } => PresenceEvent::Joined(ParticipantId::from(key)),
                    ChildEvent::Removed { key, .. } => PresenceEvent::Left(ParticipantId::from(key)),
                };
                let id = match &presence {
                    PresenceEvent::Joined(id) | PresenceEvent::Left(id) => id,
                };
                if *id == me {
                    continue;
                }
                if tx.send(presence).await.is_err() {
                    return;
                }
            }
        });
        self.track(task);

        Ok(rx)
    }

    /// Appends one addressed signal. Fire-and-forget: delivery is confirmed
    /// by nothing beyond the relay accepting the write.
    pub async fn send(&self, room: &RoomId, msg: &SignalMessage) -> Result<(), TransportError> {
        if msg.from == msg.to {
            return Err(TransportError::SelfAddressed);
        }
        let path = Self::signals_path(room);
        let value = serde_json::to_value(msg).map_err(|source| TransportError::Payload {
            path: path.clone(),
            source,
        })?;
        self.relay.push(&path, value).await?;
        debug!(%room, to = %msg.to, kind = ?msg.kind(), "signal sent");
        Ok(())
    }

    /// Live stream of signals addressed to `me`. Each signal is removed from
    /// the relay log before delivery, so every message instance is observed
    /// at most once and by its addressee only.
    pub async fn observe_incoming(
        &self,
        room: &RoomId,
        me: &ParticipantId,
    ) -> Result<mpsc::Receiver<SignalMessage>, TransportError> {
        let path = Self::signals_path(room);
        let mut watch = self
            .relay
            .watch_matching(&path, "to", Value::String(me.0.clone()), true)
            .await?;
        let relay = self.relay.clone();
        let (tx, rx) = mpsc::channel(OBSERVER_CHANNEL_CAPACITY);

        let task = tokio::spawn(async move {
            while let Some(event) = watch.recv().await {
                let ChildEvent::Added { key, value } = event else {
                    continue;
                };

                // Consume before delivering: at-most-once per instance.
                if let Err(e) = relay.remove(&path, &key).await {
                    warn!(%path, %key, error = %e, "failed to consume signal");
                    return;
                }
                match serde_json::from_value::<SignalMessage>(value) {
                    Ok(msg) => {
                        if tx.send(msg).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(%path, %key, error = %e, "dropping malformed signal"),
                }
            }
        });
        self.track(task);

        Ok(rx)
    }

    /// Leaves the room: notify peers, then cancel own observers, then
    /// retract presence, so peers hear the departure while the presence
    /// record still exists.
    pub async fn leave(&self, room: &RoomId, me: &ParticipantId) -> Result<(), TransportError> {
        match self.list_present(room, me).await {
            Ok(peers) => {
                for peer in peers {
                    let msg = SignalMessage::new(me.clone(), peer.clone(), SignalPayload::Leave);
                    if let Err(e) = self.send(room, &msg).await {
                        warn!(%room, %peer, error = %e, "failed to announce leave");
                    }
                }
            }
            Err(e) => warn!(%room, error = %e, "could not list peers while leaving"),
        }

        self.cancel_observers();

        self.relay
            .remove(&Self::participants_path(room), me.as_str())
            .await?;
        info!(%room, participant = %me, "left signaling room");
        Ok(())
    }
}
