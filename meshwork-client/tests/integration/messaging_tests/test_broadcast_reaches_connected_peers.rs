use bytes::Bytes;
use meshwork_client::{LoopbackNetwork, MemoryStore};

use crate::integration::init_tracing;
use crate::utils::{MESH_READY_TIMEOUT_MS, MESSAGE_TIMEOUT_MS, spawn_mesh, wait_for_full_mesh};

#[tokio::test]
async fn test_broadcast_reaches_connected_peers() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let (_room_id, members) = spawn_mesh(&store, &network, 3).await;
    assert!(wait_for_full_mesh(&members, MESH_READY_TIMEOUT_MS).await, "Mesh not formed");

    let sender = &members[0];
    let sender_id = sender.id().await;

    let sent = sender
        .handle
        .broadcast(Bytes::from_static(b"hello mesh"))
        .await
        .expect("Broadcast failed");
    assert_eq!(sent, 2);

    for receiver in &members[1..] {
        assert!(
            receiver
                .behavior
                .wait_for_messages(&sender_id, 1, MESSAGE_TIMEOUT_MS)
                .await
        );
        assert_eq!(
            receiver.behavior.messages_from(&sender_id).await,
            vec![Bytes::from_static(b"hello mesh")]
        );
    }

    // Nothing loops back to the sender.
    assert!(sender.behavior.messages_from(&sender_id).await.is_empty());
}

#[tokio::test]
async fn test_unicast_reaches_only_its_target() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let (_room_id, members) = spawn_mesh(&store, &network, 3).await;
    assert!(wait_for_full_mesh(&members, MESH_READY_TIMEOUT_MS).await, "Mesh not formed");

    let a_id = members[0].id().await;
    let c_id = members[2].id().await;

    let delivered = members[2]
        .handle
        .send(&a_id, "just for you")
        .await
        .expect("Send failed");
    assert!(delivered);

    assert!(
        members[0]
            .behavior
            .wait_for_messages(&c_id, 1, MESSAGE_TIMEOUT_MS)
            .await
    );
    assert!(members[1].behavior.messages_from(&c_id).await.is_empty());

    let unknown = members[2]
        .handle
        .send(&"nobody".into(), "lost")
        .await
        .expect("Send failed");
    assert!(!unknown);
}
