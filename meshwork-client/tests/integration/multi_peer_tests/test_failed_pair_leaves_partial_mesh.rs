use meshwork_client::{LoopbackNetwork, MemoryStore};
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{
    MESH_READY_TIMEOUT_MS, MESSAGE_TIMEOUT_MS, QUIET_PERIOD_MS, TestMember, spawn_mesh,
    wait_for_full_mesh,
};

#[tokio::test]
async fn test_failed_pair_leaves_partial_mesh() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let (room_id, members) = spawn_mesh(&store, &network, 2).await;
    assert!(wait_for_full_mesh(&members, MESH_READY_TIMEOUT_MS).await, "Mesh not formed");

    // One of C's two offers is rejected by whichever member applies it first.
    network.fail_next_remote_descriptions(1).await;

    let c = TestMember::spawn(Arc::new(store.clone()), &network);
    c.handle.join_room(&room_id).await.expect("Failed to join room");

    assert!(c.wait_for_ready_peers(1, MESH_READY_TIMEOUT_MS).await, "C has no peer");
    assert!(!c.wait_for_ready_peers(2, QUIET_PERIOD_MS).await, "Failed pair connected");

    let (a_id, b_id, c_id) = (members[0].id().await, members[1].id().await, c.id().await);
    let a_c = network.is_connected(&a_id, &c_id).await;
    let b_c = network.is_connected(&b_id, &c_id).await;
    assert!(a_c ^ b_c, "Exactly one of C's pairs should connect");

    // The earlier pair is unaffected.
    assert!(network.is_connected(&a_id, &b_id).await);
    let sent = members[0]
        .handle
        .broadcast("still here")
        .await
        .expect("Broadcast failed");
    assert_eq!(sent, if a_c { 2 } else { 1 });
    assert!(
        members[1]
            .behavior
            .wait_for_messages(&a_id, 1, MESSAGE_TIMEOUT_MS)
            .await
    );

    // The side that rejected the offer dropped its connection entirely.
    let (rejecting, rejected_by) = if a_c { (&members[1], &b_id) } else { (&members[0], &a_id) };
    assert!(rejecting.status().await.connection(&c_id).is_none());
    assert!(c.status().await.connection(rejected_by).is_some());
}
