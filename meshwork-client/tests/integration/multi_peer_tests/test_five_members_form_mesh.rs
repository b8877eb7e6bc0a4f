use meshwork_client::{LoopbackNetwork, MemoryStore};
use std::collections::HashSet;

use crate::integration::init_tracing;
use crate::utils::{
    MESH_READY_TIMEOUT_MS, spawn_mesh, stored_links, stored_members, wait_for_full_mesh,
};

#[tokio::test]
async fn test_five_members_form_mesh() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let (room_id, members) = spawn_mesh(&store, &network, 5).await;
    assert!(wait_for_full_mesh(&members, MESH_READY_TIMEOUT_MS).await, "Mesh not formed");

    let registered = stored_members(&store, &room_id).await;
    assert_eq!(registered.len(), 5);

    let links = stored_links(&store, &room_id).await;
    assert_eq!(links.len(), 10);

    let mut pairs = HashSet::new();
    for (owner, remote) in &links {
        let owner_seq = registered[owner].join_seq;
        let remote_seq = registered[remote].join_seq;
        assert!(
            owner_seq > remote_seq,
            "Link {} -> {} is owned by the earlier joiner",
            owner,
            remote
        );
        assert!(pairs.insert((remote.clone(), owner.clone())));
    }

    for member in &members {
        let status = member.status().await;
        assert_eq!(status.ready_peers().len(), 4);
    }
}
