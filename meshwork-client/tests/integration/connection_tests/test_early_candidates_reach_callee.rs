use meshwork_client::store::{
    Fields, RoomLayout, SignalingStore, candidate_fields, join_fields, link_offer_fields,
};
use meshwork_client::{LoopbackNetwork, MemoryStore};
use meshwork_core::{IceCandidate, JoinSeq, LinkState, MemberId, Role, SessionDescription};
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{MESH_READY_TIMEOUT_MS, TestMember};

#[tokio::test]
async fn test_callee_queues_candidates_until_offer() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();

    let a = TestMember::spawn(Arc::new(store.clone()), &network);
    let room_id = a.handle.create_room().await.expect("Failed to create room");
    let a_id = a.id().await;

    // A later member that exists only as store records: a link without an offer yet,
    // and candidates already published under it.
    let layout = RoomLayout::new(&room_id);
    let later = MemberId::from("later-member");
    store
        .set(&layout.member(&later), join_fields(JoinSeq::next()))
        .await
        .expect("Failed to write member");
    let link = layout.link(&later, &a_id);
    store.set(&link.doc, Fields::new()).await.expect("Failed to write link");
    for n in 1..=2 {
        let candidate = IceCandidate::new(format!(
            "candidate:{n} 1 udp 2130706431 127.0.0.1 5000{n} typ host"
        ));
        store
            .append(&link.owner_candidates, candidate_fields(&candidate))
            .await
            .expect("Failed to append candidate");
    }

    assert!(
        a.wait_for_connection(&later, MESH_READY_TIMEOUT_MS, |c| {
            c.state == LinkState::AwaitingOffer && c.pending_candidates == 2
        })
        .await,
        "Candidates were not queued while awaiting the offer"
    );
    let status = a.status().await;
    assert_eq!(status.connection(&later).map(|c| c.role), Some(Role::Callee));

    let offer = SessionDescription::offer(format!("v=0\r\no=loopback {} {}\r\n", later, a_id));
    store
        .update(&link.doc, link_offer_fields(&offer))
        .await
        .expect("Failed to publish offer");

    assert!(
        a.wait_for_connection(&later, MESH_READY_TIMEOUT_MS, |c| {
            c.state == LinkState::IceExchange && c.pending_candidates == 0
        })
        .await,
        "Queued candidates were not applied after the offer"
    );

    let stored = store
        .get(&link.doc)
        .await
        .expect("Failed to read link")
        .expect("Link removed");
    assert!(stored.fields.contains_key("answer"));
    let published = store
        .list(&link.remote_candidates)
        .await
        .expect("Failed to list candidates");
    assert!(!published.is_empty());
}
