use parlor_core::SessionState;
use parlor_session::{MemoryRelay, RelayClient};
use std::time::Duration;

use crate::integration::{create_test_session, init_tracing};
use crate::utils::{BRIDGE_TIMEOUT_MS, EVENT_TIMEOUT_MS, SILENCE_WINDOW_MS, wait_for_state};

#[tokio::test]
async fn test_leave_drops_peer_on_the_other_side() {
    init_tracing();

    let relay = MemoryRelay::new();
    let alice = create_test_session(&relay, "r1", "alice");
    let bob = create_test_session(&relay, "r1", "bob");

    alice.join_room().await.expect("alice join");
    bob.join_room().await.expect("bob join");

    let bob_id = bob.participant_id().clone();
    assert!(
        wait_for_state(&alice, BRIDGE_TIMEOUT_MS, |s| s.is_connected_to(&bob_id)).await,
        "sessions never bridged"
    );

    bob.leave_room().await;
    assert_eq!(bob.state().state, SessionState::Disconnected);

    // Alice hears the Leave signal, closes the entry, forgets the peer.
    assert!(
        wait_for_state(&alice, EVENT_TIMEOUT_MS, |s| !s.is_connected_to(&bob_id)).await,
        "alice still lists bob after his leave"
    );

    alice.leave_room().await;
}

#[tokio::test]
async fn test_leave_is_safe_without_join() {
    init_tracing();

    let relay = MemoryRelay::new();
    let alice = create_test_session(&relay, "r1", "alice");

    // Never joined; teardown must still be harmless, and repeatable.
    alice.leave_room().await;
    alice.leave_room().await;

    let state = alice.state();
    assert_eq!(state.state, SessionState::Disconnected);
    assert!(state.connected_peers.is_empty());
}

#[tokio::test]
async fn test_leave_without_join_broadcasts_nothing() {
    init_tracing();

    let relay = MemoryRelay::new();
    let bob = create_test_session(&relay, "r1", "bob");
    bob.join_room().await.expect("bob join");

    let probe = relay.client();
    let mut signals = probe
        .watch("rooms/r1/signals", false)
        .await
        .expect("watch signal log");

    // Alice never entered the room; her teardown must not announce a
    // departure to the participants who are there.
    let alice = create_test_session(&relay, "r1", "alice");
    alice.leave_room().await;

    let quiet = tokio::time::timeout(Duration::from_millis(SILENCE_WINDOW_MS), signals.recv())
        .await
        .is_err();
    assert!(quiet, "no signal may reach the room");

    bob.leave_room().await;
}
