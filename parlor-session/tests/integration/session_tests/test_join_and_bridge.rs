use parlor_core::SessionState;
use parlor_session::MemoryRelay;

use crate::integration::{create_test_session, init_tracing};
use crate::utils::{BRIDGE_TIMEOUT_MS, wait_for_state};

#[tokio::test]
async fn test_two_sessions_bridge() {
    init_tracing();

    let relay = MemoryRelay::new();
    let alice = create_test_session(&relay, "r1", "alice");
    let bob = create_test_session(&relay, "r1", "bob");

    alice.join_room().await.expect("alice join");
    assert_eq!(alice.state().state, SessionState::Connected);

    bob.join_room().await.expect("bob join");
    assert_eq!(bob.state().state, SessionState::Connected);

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

    bob.leave_room().await;
    alice.leave_room().await;
}

#[tokio::test]
async fn test_redundant_join_is_noop() {
    init_tracing();

    let relay = MemoryRelay::new();
    let alice = create_test_session(&relay, "r1", "alice");

    alice.join_room().await.expect("first join");
    assert_eq!(alice.state().state, SessionState::Connected);

    // Already connected: the second call must not disturb the session.
    alice.join_room().await.expect("second join is a no-op");
    assert_eq!(alice.state().state, SessionState::Connected);

    alice.leave_room().await;
    assert_eq!(alice.state().state, SessionState::Disconnected);
}
