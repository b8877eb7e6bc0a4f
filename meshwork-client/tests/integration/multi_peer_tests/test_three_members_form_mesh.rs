use meshwork_client::{LoopbackNetwork, MemoryStore};
use meshwork_core::MemberId;
use std::collections::HashSet;

use crate::integration::init_tracing;
use crate::utils::{MESH_READY_TIMEOUT_MS, spawn_mesh, stored_links, wait_for_full_mesh};

#[tokio::test]
async fn test_three_members_form_mesh() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let (room_id, members) = spawn_mesh(&store, &network, 3).await;
    assert!(wait_for_full_mesh(&members, MESH_READY_TIMEOUT_MS).await, "Mesh not formed");

    let mut ids = Vec::new();
    for member in &members {
        ids.push(member.id().await);
    }

    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            assert!(network.is_connected(a, b).await, "{} and {} not connected", a, b);
        }
    }

    let links = stored_links(&store, &room_id).await;
    assert_eq!(links.len(), 3);

    let pairs: HashSet<(String, String)> = links
        .iter()
        .map(|(owner, remote)| {
            let (lo, hi) = if owner < remote { (owner, remote) } else { (remote, owner) };
            (lo.to_string(), hi.to_string())
        })
        .collect();
    assert_eq!(pairs.len(), 3, "A pair has more than one link");

    // Creator owns nothing; the last joiner owns one link per earlier member.
    let owned_by = |id: &MemberId| links.iter().filter(|(owner, _)| owner == id).count();
    assert_eq!(owned_by(&ids[0]), 0);
    assert_eq!(owned_by(&ids[1]), 1);
    assert_eq!(owned_by(&ids[2]), 2);
}
