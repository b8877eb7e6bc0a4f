use crate::mesh::MeshStatus;
use bytes::Bytes;
use meshwork_core::{MemberId, MeshError, RoomId};
use tokio::sync::oneshot;

/// Requests sent by [`MeshHandle`](crate::MeshHandle) to the coordinator loop.
#[derive(Debug)]
pub enum MeshCommand {
    CreateRoom {
        reply: oneshot::Sender<Result<RoomId, MeshError>>,
    },

    JoinRoom {
        room_id: RoomId,
        reply: oneshot::Sender<Result<(), MeshError>>,
    },

    /// Send to every connected peer; replies with the number of successful sends.
    Broadcast {
        data: Bytes,
        reply: oneshot::Sender<usize>,
    },

    Send {
        remote: MemberId,
        data: Bytes,
        reply: oneshot::Sender<bool>,
    },

    Status {
        reply: oneshot::Sender<MeshStatus>,
    },
}
