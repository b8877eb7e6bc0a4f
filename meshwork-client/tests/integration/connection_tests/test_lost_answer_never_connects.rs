use meshwork_client::{LoopbackNetwork, MemoryStore};
use meshwork_core::LinkState;
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{DocumentGate, GatedStore, QUIET_PERIOD_MS, TestMember};

#[tokio::test]
async fn test_lost_answer_never_connects() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();

    let a = TestMember::spawn(Arc::new(store.clone()), &network);
    let room_id = a.handle.create_room().await.expect("Failed to create room");

    let gated = GatedStore::new(store.clone(), DocumentGate::Drop);
    let b = TestMember::spawn(Arc::new(gated), &network);
    b.handle.join_room(&room_id).await.expect("Failed to join room");

    assert!(!b.wait_for_ready_peers(1, QUIET_PERIOD_MS).await);
    assert!(!a.wait_for_ready_peers(1, QUIET_PERIOD_MS).await);

    let (a_id, b_id) = (a.id().await, b.id().await);
    assert!(!network.is_connected(&a_id, &b_id).await);

    // There is no retry: both sides stay where the handshake stalled.
    assert_eq!(
        b.status().await.connection(&a_id).map(|c| c.state),
        Some(LinkState::AwaitingAnswer)
    );
    assert_eq!(
        a.status().await.connection(&b_id).map(|c| c.state),
        Some(LinkState::IceExchange)
    );
    assert!(a.behavior.get_events().await.is_empty());
    assert!(b.behavior.get_events().await.is_empty());
}
