use crate::mesh::MeshContext;
use async_trait::async_trait;
use bytes::Bytes;
use meshwork_core::MemberId;
use tokio::sync::mpsc;

/// Application hooks invoked by the coordinator loop.
#[async_trait]
pub trait MeshBehavior: Send + Sync + 'static {
    async fn on_connect(&self, ctx: &MeshContext, remote: MemberId);

    async fn on_message(&self, ctx: &MeshContext, remote: MemberId, data: Bytes);

    async fn on_disconnect(&self, ctx: &MeshContext, remote: MemberId);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshNotification {
    Connected(MemberId),
    Message { from: MemberId, data: Bytes },
    Disconnected(MemberId),
}

/// Behavior that turns every callback into a [`MeshNotification`] on a channel.
pub struct NotificationBehavior {
    tx: mpsc::UnboundedSender<MeshNotification>,
}

impl NotificationBehavior {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MeshNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MeshBehavior for NotificationBehavior {
    async fn on_connect(&self, _ctx: &MeshContext, remote: MemberId) {
        let _ = self.tx.send(MeshNotification::Connected(remote));
    }

    async fn on_message(&self, _ctx: &MeshContext, remote: MemberId, data: Bytes) {
        let _ = self.tx.send(MeshNotification::Message { from: remote, data });
    }

    async fn on_disconnect(&self, _ctx: &MeshContext, remote: MemberId) {
        let _ = self.tx.send(MeshNotification::Disconnected(remote));
    }
}
