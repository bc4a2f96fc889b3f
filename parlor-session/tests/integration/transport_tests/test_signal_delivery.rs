use parlor_core::{ParticipantId, RoomId, SignalKind, SignalMessage, SignalPayload};
use parlor_session::{MemoryRelay, RelayClient, SignalingTransport, TransportError};

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT_MS, SILENCE_WINDOW_MS, recv_within, stays_silent};

#[tokio::test]
async fn test_signal_delivered_exactly_once_to_addressee() {
    init_tracing();

    let relay = MemoryRelay::new();
    let room = RoomId::from("r1");
    let alice = ParticipantId::from("alice");
    let bob = ParticipantId::from("bob");
    let carol = ParticipantId::from("carol");

    let t_alice = SignalingTransport::new(relay.client());
    let t_bob = SignalingTransport::new(relay.client());
    let t_carol = SignalingTransport::new(relay.client());

    let mut bob_rx = t_bob
        .observe_incoming(&room, &bob)
        .await
        .expect("bob observes");
    let mut carol_rx = t_carol
        .observe_incoming(&room, &carol)
        .await
        .expect("carol observes");

    let msg = SignalMessage::new(
        alice.clone(),
        bob.clone(),
        SignalPayload::Offer {
            sdp: "v=0".to_string(),
        },
    );
    t_alice.send(&room, &msg).await.expect("send");

    let received = recv_within(&mut bob_rx, EVENT_TIMEOUT_MS)
        .await
        .expect("bob should receive the offer");
    assert_eq!(received.from, alice);
    assert_eq!(received.kind(), SignalKind::Offer);

    // Delivered once only, and to the addressee only.
    assert!(stays_silent(&mut bob_rx, SILENCE_WINDOW_MS).await);
    assert!(stays_silent(&mut carol_rx, SILENCE_WINDOW_MS).await);

    // Consumed from the relay log on delivery.
    let probe = relay.client();
    let remaining = probe
        .children("rooms/r1/signals")
        .await
        .expect("inspect log");
    assert!(remaining.is_empty(), "signal log should be drained");
}

#[tokio::test]
async fn test_self_addressed_signal_rejected() {
    init_tracing();

    let relay = MemoryRelay::new();
    let room = RoomId::from("r1");
    let alice = ParticipantId::from("alice");

    let transport = SignalingTransport::new(relay.client());

    // Built by hand: the constructor refuses self-addressed messages.
    let msg = SignalMessage {
        from: alice.clone(),
        to: alice,
        payload: SignalPayload::Leave,
        sent_at: 0,
    };

    let err = transport.send(&room, &msg).await.unwrap_err();
    assert!(matches!(err, TransportError::SelfAddressed));
}
