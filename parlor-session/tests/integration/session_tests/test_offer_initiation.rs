use parlor_core::SessionState;
use parlor_session::{MemoryRelay, RelayClient, SilenceSource, VoiceSession, VoiceSessionConfig};
use std::sync::Arc;
use std::time::Duration;

use crate::integration::{create_test_session, init_tracing};
use crate::utils::{BRIDGE_TIMEOUT_MS, GatedRelayClient, drain_offer_senders, wait_for_state};

#[tokio::test]
async fn test_larger_id_joining_first_never_offers() {
    init_tracing();

    let relay = MemoryRelay::new();
    let probe = relay.client();
    let mut signals = probe
        .watch("rooms/r1/signals", false)
        .await
        .expect("watch signal log");

    // The larger id sits alone in the room; the smaller id arrives second
    // and must initiate from its join-time snapshot while the larger side
    // only answers.
    let bob = create_test_session(&relay, "r1", "bob");
    bob.join_room().await.expect("bob join");

    let alice = create_test_session(&relay, "r1", "alice");
    alice.join_room().await.expect("alice join");

    let bob_id = bob.participant_id().clone();
    let alice_id = alice.participant_id().clone();
    assert!(
        wait_for_state(&alice, BRIDGE_TIMEOUT_MS, |s| s.is_connected_to(&bob_id)).await,
        "alice never bridged to bob"
    );
    assert!(
        wait_for_state(&bob, BRIDGE_TIMEOUT_MS, |s| s.is_connected_to(&alice_id)).await,
        "bob never bridged to alice"
    );

    let offers = drain_offer_senders(&mut signals).await;
    assert_eq!(offers, vec![alice_id], "only the smaller id may offer, once");

    bob.leave_room().await;
    alice.leave_room().await;
}

#[tokio::test]
async fn test_peer_arriving_during_join_snapshot_is_offered_once() {
    init_tracing();

    let relay = MemoryRelay::new();
    let probe = relay.client();
    let mut signals = probe
        .watch("rooms/r1/signals", false)
        .await
        .expect("watch signal log");

    let (alice_client, gate) = GatedRelayClient::new(relay.client());
    let mut config = VoiceSessionConfig::new("r1", "alice", "alice");
    config.ice_servers = Vec::new();
    let alice = Arc::new(
        VoiceSession::new(config, alice_client, Arc::new(SilenceSource)).expect("session setup"),
    );

    // Alice's join parks on the snapshot read with her observers already
    // attached; bob joins inside that window, so he is visible to her both
    // as a presence delta and in the snapshot.
    let joining = {
        let alice = alice.clone();
        tokio::spawn(async move { alice.join_room().await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;

    let bob = create_test_session(&relay, "r1", "bob");
    bob.join_room().await.expect("bob join");
    tokio::time::sleep(Duration::from_millis(300)).await;

    gate.send(true).expect("open gate");
    joining.await.expect("join task").expect("alice join");
    assert_eq!(alice.state().state, SessionState::Connected);

    let bob_id = bob.participant_id().clone();
    let alice_id = alice.participant_id().clone();
    assert!(
        wait_for_state(&alice, BRIDGE_TIMEOUT_MS, |s| s.is_connected_to(&bob_id)).await,
        "alice never bridged to bob"
    );
    assert!(
        wait_for_state(&bob, BRIDGE_TIMEOUT_MS, |s| s.is_connected_to(&alice_id)).await,
        "bob never bridged to alice"
    );

    // Seen twice, offered once: a second offer would replace the entry and
    // strand the answer already in flight for the first one.
    let offers = drain_offer_senders(&mut signals).await;
    assert_eq!(offers, vec![alice_id]);

    bob.leave_room().await;
    alice.leave_room().await;
}
