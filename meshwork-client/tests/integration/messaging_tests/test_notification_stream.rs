use meshwork_client::{LoopbackNetwork, MemoryStore, MeshConfig, MeshHandle, MeshNotification};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::integration::init_tracing;

#[tokio::test]
async fn test_notification_stream() {
    init_tracing();

    let store = Arc::new(MemoryStore::new());
    let network = Arc::new(LoopbackNetwork::new());

    let (a, mut a_events) =
        MeshHandle::spawn_with_notifications(store.clone(), network.clone(), MeshConfig::local());
    let (b, mut b_events) =
        MeshHandle::spawn_with_notifications(store, network, MeshConfig::local());

    let room_id = a.create_room().await.expect("Failed to create room");
    b.join_room(&room_id).await.expect("Failed to join room");
    let a_id = a.local_member().await.expect("A has no member id");
    let b_id = b.local_member().await.expect("B has no member id");

    let first = timeout(Duration::from_secs(5), b_events.recv())
        .await
        .expect("Timed out waiting for B");
    assert_eq!(first, Some(MeshNotification::Connected(a_id.clone())));

    let first = timeout(Duration::from_secs(5), a_events.recv())
        .await
        .expect("Timed out waiting for A");
    assert_eq!(first, Some(MeshNotification::Connected(b_id.clone())));

    assert!(a.send(&b_id, "ping").await.expect("Send failed"));

    let next = timeout(Duration::from_secs(5), b_events.recv())
        .await
        .expect("Timed out waiting for message");
    assert_eq!(
        next,
        Some(MeshNotification::Message {
            from: a_id,
            data: "ping".into(),
        })
    );
}
