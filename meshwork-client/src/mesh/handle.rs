use crate::config::MeshConfig;
use crate::mesh::{
    MeshBehavior, MeshCommand, MeshCoordinator, MeshNotification, MeshStatus, NotificationBehavior,
};
use crate::store::SignalingStore;
use crate::transport::TransportFactory;
use bytes::Bytes;
use meshwork_core::{MemberId, MeshError, RoomId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Client side of a running [`MeshCoordinator`].
///
/// Clones share the coordinator. When the last handle is dropped the coordinator closes
/// its transports and stops; records in the store are left untouched.
#[derive(Clone)]
pub struct MeshHandle {
    command_tx: mpsc::Sender<MeshCommand>,
}

impl MeshHandle {
    /// Spawns a coordinator on the current tokio runtime.
    pub fn spawn(
        store: Arc<dyn SignalingStore>,
        transports: Arc<dyn TransportFactory>,
        behavior: Box<dyn MeshBehavior>,
        config: MeshConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));

        let coordinator = MeshCoordinator::new(behavior, command_rx, store, transports, &config);
        tokio::spawn(coordinator.run());

        Self { command_tx }
    }

    /// Like [`MeshHandle::spawn`], with connection and message notifications on a channel.
    pub fn spawn_with_notifications(
        store: Arc<dyn SignalingStore>,
        transports: Arc<dyn TransportFactory>,
        config: MeshConfig,
    ) -> (Self, mpsc::UnboundedReceiver<MeshNotification>) {
        let (behavior, notifications) = NotificationBehavior::new();
        let handle = Self::spawn(store, transports, Box::new(behavior), config);
        (handle, notifications)
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> MeshCommand,
    ) -> Result<R, MeshError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| MeshError::CoordinatorClosed)?;
        reply_rx.await.map_err(|_| MeshError::CoordinatorClosed)
    }

    /// Creates a room and joins it as its first member.
    pub async fn create_room(&self) -> Result<RoomId, MeshError> {
        self.request(|reply| MeshCommand::CreateRoom { reply })
            .await?
    }

    /// Joins an existing room and starts connecting to every member already in it.
    pub async fn join_room(&self, room_id: &RoomId) -> Result<(), MeshError> {
        let room_id = room_id.clone();
        self.request(|reply| MeshCommand::JoinRoom { room_id, reply })
            .await?
    }

    /// Sends to every peer connected at the time of the call and returns how many
    /// sends succeeded. Peers still negotiating do not receive it later.
    pub async fn broadcast(&self, data: impl Into<Bytes>) -> Result<usize, MeshError> {
        let data = data.into();
        self.request(|reply| MeshCommand::Broadcast { data, reply })
            .await
    }

    pub async fn send(&self, remote: &MemberId, data: impl Into<Bytes>) -> Result<bool, MeshError> {
        let remote = remote.clone();
        let data = data.into();
        self.request(|reply| MeshCommand::Send { remote, data, reply })
            .await
    }

    pub async fn status(&self) -> Result<MeshStatus, MeshError> {
        self.request(|reply| MeshCommand::Status { reply }).await
    }

    pub async fn room_id(&self) -> Result<Option<RoomId>, MeshError> {
        Ok(self.status().await?.room)
    }

    pub async fn local_member(&self) -> Result<MemberId, MeshError> {
        self.status()
            .await?
            .local
            .map(|member| member.id)
            .ok_or(MeshError::NotInRoom)
    }
}
