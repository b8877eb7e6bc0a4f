use meshwork_client::{MemoryStore, MeshConfig, MeshHandle, MeshNotification, WebRtcTransportFactory};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::integration::init_tracing;

/// Full handshake over real peer connections, host and loopback candidates only.
#[tokio::test]
async fn test_webrtc_localhost() {
    init_tracing();

    let store = Arc::new(MemoryStore::new());
    let config = MeshConfig::local();
    assert!(config.include_loopback_candidates);
    let transports =
        Arc::new(WebRtcTransportFactory::new(&config).expect("Failed to build WebRTC API"));

    let (a, mut a_events) =
        MeshHandle::spawn_with_notifications(store.clone(), transports.clone(), config.clone());
    let (b, mut b_events) = MeshHandle::spawn_with_notifications(store, transports, config);

    let room_id = a.create_room().await.expect("Failed to create room");
    b.join_room(&room_id).await.expect("Failed to join room");
    let b_id = b.local_member().await.expect("B has no member id");

    let connected = timeout(Duration::from_secs(15), b_events.recv())
        .await
        .expect("Timed out waiting for connection");
    assert!(matches!(connected, Some(MeshNotification::Connected(_))));

    // Connected is only reported once the message channel is open.
    assert_eq!(b.broadcast("over the wire").await.expect("Broadcast failed"), 1);

    let received = timeout(Duration::from_secs(10), async {
        while let Some(notification) = a_events.recv().await {
            if let MeshNotification::Message { from, data } = notification {
                return Some((from, data));
            }
        }
        None
    })
    .await
    .expect("Timed out waiting for message");

    let (from, data) = received.expect("Notification stream closed");
    assert_eq!(from, b_id);
    assert_eq!(&data[..], b"over the wire");
}
