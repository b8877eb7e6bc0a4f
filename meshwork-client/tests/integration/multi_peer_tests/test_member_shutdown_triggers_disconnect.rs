use meshwork_client::{LoopbackNetwork, MemoryStore};

use crate::integration::init_tracing;
use crate::utils::{
    MESH_READY_TIMEOUT_MS, MeshEvent, spawn_mesh, stored_members, wait_for_full_mesh,
};

#[tokio::test]
async fn test_member_shutdown_triggers_disconnect() {
    init_tracing();

    let store = MemoryStore::new();
    let network = LoopbackNetwork::new();
    let (room_id, mut members) = spawn_mesh(&store, &network, 3).await;
    assert!(wait_for_full_mesh(&members, MESH_READY_TIMEOUT_MS).await, "Mesh not formed");

    let leaving = members.pop().expect("Mesh is empty");
    let leaving_id = leaving.id().await;
    drop(leaving);

    for member in &members {
        let noticed = member
            .behavior
            .wait_until(MESH_READY_TIMEOUT_MS, |events| {
                events.contains(&MeshEvent::Disconnect {
                    remote: leaving_id.clone(),
                })
            })
            .await;
        assert!(noticed, "Disconnect was not reported");
        assert!(member.status().await.connection(&leaving_id).is_none());
    }

    // Remaining pair keeps working and the store still lists the departed member.
    assert!(members[0].wait_for_ready_peers(1, MESH_READY_TIMEOUT_MS).await);
    assert_eq!(members[0].status().await.ready_peers().len(), 1);
    assert!(stored_members(&store, &room_id).await.contains_key(&leaving_id));
}
