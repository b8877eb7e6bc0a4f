use bytes::Bytes;
use meshwork_client::{LoopbackNetwork, MemoryStore};
use meshwork_core::LinkState;
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{
    MESH_READY_TIMEOUT_MS, MESSAGE_TIMEOUT_MS, MeshEvent, QUIET_PERIOD_MS, TestMeshBehavior,
    TestMember,
};

#[tokio::test]
async fn test_peer_announced_once_channel_opens() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    network.hold_channels().await;

    let a = TestMember::spawn_with(
        Arc::new(store.clone()),
        &network,
        TestMeshBehavior::greeting("welcome"),
    );
    let room_id = a.handle.create_room().await.expect("Failed to create room");

    let b = TestMember::spawn(Arc::new(store.clone()), &network);
    b.handle.join_room(&room_id).await.expect("Failed to join room");
    let (a_id, b_id) = (a.id().await, b.id().await);

    // Both transports connect while the message channel stays shut.
    for (member, remote) in [(&a, &b_id), (&b, &a_id)] {
        assert!(
            member
                .wait_for_connection(remote, MESH_READY_TIMEOUT_MS, |c| {
                    c.state == LinkState::Connected && !c.channel_open
                })
                .await,
            "Transport never connected"
        );
    }

    tokio::time::sleep(std::time::Duration::from_millis(QUIET_PERIOD_MS)).await;
    assert!(!a.behavior.has_connect(&b_id).await);
    assert!(!b.behavior.has_connect(&a_id).await);
    assert_eq!(a.handle.broadcast("too early").await.expect("Broadcast failed"), 0);
    assert!(a.status().await.ready_peers().is_empty());

    network.release_channels().await;

    // The greeting sent from inside on_connect goes through.
    let greeted = MeshEvent::Greeted {
        remote: b_id.clone(),
        delivered: true,
    };
    assert!(
        a.behavior
            .wait_until(MESH_READY_TIMEOUT_MS, |events| events.contains(&greeted))
            .await,
        "Greeting from on_connect was not delivered"
    );
    assert!(b.behavior.wait_for_messages(&a_id, 1, MESSAGE_TIMEOUT_MS).await);
    assert!(b.behavior.has_connect(&a_id).await);

    assert_eq!(a.handle.broadcast("hi").await.expect("Broadcast failed"), 1);
    assert!(b.behavior.wait_for_messages(&a_id, 2, MESSAGE_TIMEOUT_MS).await);
    assert_eq!(
        b.behavior.messages_from(&a_id).await,
        vec![Bytes::from_static(b"welcome"), Bytes::from_static(b"hi")]
    );
}
