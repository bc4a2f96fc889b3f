use parlor_core::{ParticipantId, RoomId, SignalKind};
use parlor_session::{MemoryRelay, PresenceEvent, RelayClient, SignalingTransport};

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT_MS, recv_within};

#[tokio::test]
async fn test_leave_notifies_peers_before_retracting_presence() {
    init_tracing();

    let relay = MemoryRelay::new();
    let room = RoomId::from("r1");
    let alice = ParticipantId::from("alice");
    let bob = ParticipantId::from("bob");

    let t_alice = SignalingTransport::new(relay.client());
    let t_bob = SignalingTransport::new(relay.client());

    t_alice.join(&room, &alice, "Alice").await.expect("alice join");
    t_bob.join(&room, &bob, "Bob").await.expect("bob join");

    let mut bob_rx = t_bob
        .observe_incoming(&room, &bob)
        .await
        .expect("bob observes");

    t_alice.leave(&room, &alice).await.expect("alice leaves");

    let msg = recv_within(&mut bob_rx, EVENT_TIMEOUT_MS)
        .await
        .expect("bob should hear the leave");
    assert_eq!(msg.from, alice);
    assert_eq!(msg.kind(), SignalKind::Leave);

    let present = t_bob.list_present(&room, &bob).await.expect("list");
    assert!(present.is_empty(), "alice's presence should be gone");
}

#[tokio::test]
async fn test_relay_disconnect_retracts_presence() {
    init_tracing();

    let relay = MemoryRelay::new();
    let room = RoomId::from("r1");
    let alice = ParticipantId::from("alice");
    let bob = ParticipantId::from("bob");

    let alice_client = relay.client();
    let t_alice = SignalingTransport::new(alice_client.clone());
    let t_bob = SignalingTransport::new(relay.client());

    t_alice.join(&room, &alice, "Alice").await.expect("alice join");
    t_bob.join(&room, &bob, "Bob").await.expect("bob join");

    let mut presence = t_bob
        .observe_presence(&room, &bob)
        .await
        .expect("observe presence");

    // Simulated crash: no leave call, the connection just drops.
    alice_client.disconnect().await;

    let event = recv_within(&mut presence, EVENT_TIMEOUT_MS)
        .await
        .expect("expected a left event");
    assert_eq!(event, PresenceEvent::Left(alice));
}
