use async_trait::async_trait;
use bytes::Bytes;
use meshwork_client::{MeshBehavior, MeshContext};
use meshwork_core::MemberId;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Event types recorded by TestMeshBehavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    Connect { remote: MemberId },
    Message { remote: MemberId, data: Bytes },
    Disconnect { remote: MemberId },
    /// The greeting sent from inside `on_connect`, and whether the send succeeded.
    Greeted { remote: MemberId, delivered: bool },
}

/// A MeshBehavior that records every callback.
#[derive(Clone, Default)]
pub struct TestMeshBehavior {
    events: Arc<Mutex<Vec<MeshEvent>>>,
    greeting: Option<Bytes>,
}

impl TestMeshBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also sends `greeting` to every peer from inside `on_connect`.
    pub fn greeting(greeting: impl Into<Bytes>) -> Self {
        Self {
            greeting: Some(greeting.into()),
            ..Self::default()
        }
    }

    pub async fn get_events(&self) -> Vec<MeshEvent> {
        self.events.lock().await.clone()
    }

    /// Wait until `predicate` holds for the recorded events, polling every 10 ms.
    pub async fn wait_until<F>(&self, timeout_ms: u64, predicate: F) -> bool
    where
        F: Fn(&[MeshEvent]) -> bool,
    {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            if predicate(&self.events.lock().await) {
                return true;
            }
            if start.elapsed() > timeout {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    pub async fn has_connect(&self, remote: &MemberId) -> bool {
        self.events
            .lock()
            .await
            .iter()
            .any(|e| matches!(e, MeshEvent::Connect { remote: id } if id == remote))
    }

    pub async fn has_disconnect(&self, remote: &MemberId) -> bool {
        self.events
            .lock()
            .await
            .iter()
            .any(|e| matches!(e, MeshEvent::Disconnect { remote: id } if id == remote))
    }

    pub async fn messages_from(&self, remote: &MemberId) -> Vec<Bytes> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                MeshEvent::Message { remote: id, data } if id == remote => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn wait_for_messages(&self, remote: &MemberId, count: usize, timeout_ms: u64) -> bool {
        self.wait_until(timeout_ms, |events| {
            events
                .iter()
                .filter(|e| matches!(e, MeshEvent::Message { remote: id, .. } if id == remote))
                .count()
                >= count
        })
        .await
    }
}

#[async_trait]
impl MeshBehavior for TestMeshBehavior {
    async fn on_connect(&self, ctx: &MeshContext, remote: MemberId) {
        tracing::info!("[TestBehavior] on_connect: {}", remote);
        self.events.lock().await.push(MeshEvent::Connect {
            remote: remote.clone(),
        });

        if let Some(greeting) = &self.greeting {
            let delivered = ctx.send(&remote, greeting.clone()).await;
            self.events
                .lock()
                .await
                .push(MeshEvent::Greeted { remote, delivered });
        }
    }

    async fn on_message(&self, _ctx: &MeshContext, remote: MemberId, data: Bytes) {
        tracing::info!("[TestBehavior] on_message from {}: {} bytes", remote, data.len());
        self.events
            .lock()
            .await
            .push(MeshEvent::Message { remote, data });
    }

    async fn on_disconnect(&self, _ctx: &MeshContext, remote: MemberId) {
        tracing::info!("[TestBehavior] on_disconnect: {}", remote);
        self.events.lock().await.push(MeshEvent::Disconnect { remote });
    }
}
