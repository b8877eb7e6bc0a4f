use anyhow::{Context, Result};
use meshwork::MemberId;
use meshwork::RoomId;
use meshwork::client::store::SignalingStore;
use meshwork::client::transport::TransportFactory;
use meshwork::client::{
    LoopbackNetwork, MemoryStore, MeshConfig, MeshHandle, MeshNotification,
    WebRtcTransportFactory,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

pub struct Delivery {
    pub from: String,
    pub to: String,
    pub text: String,
}

struct SimulatedMember {
    label: String,
    handle: MeshHandle,
    notifications: mpsc::UnboundedReceiver<MeshNotification>,
}

/// Members of one room living in this process, sharing a [`MemoryStore`].
pub struct SimulatedMesh {
    room_id: RoomId,
    members: Vec<SimulatedMember>,
    labels: HashMap<MemberId, String>,
}

impl SimulatedMesh {
    pub async fn build(size: usize, loopback: bool, config: MeshConfig) -> Result<Self> {
        let store: Arc<dyn SignalingStore> = Arc::new(MemoryStore::new());
        let transports: Arc<dyn TransportFactory> = if loopback {
            Arc::new(LoopbackNetwork::new())
        } else {
            Arc::new(WebRtcTransportFactory::new(&config)?)
        };

        let mut members = Vec::with_capacity(size);
        let mut labels = HashMap::new();
        let mut room_id = None;

        for index in 0..size {
            let label = format!("member-{}", index + 1);
            let (handle, notifications) = MeshHandle::spawn_with_notifications(
                store.clone(),
                transports.clone(),
                config.clone(),
            );

            let room = match room_id.clone() {
                None => {
                    let created = handle.create_room().await.context("Failed to create room")?;
                    room_id = Some(created.clone());
                    created
                }
                Some(existing) => {
                    handle
                        .join_room(&existing)
                        .await
                        .with_context(|| format!("{} failed to join", label))?;
                    existing
                }
            };

            let id = handle.local_member().await?;
            info!("{} is {} in room {}", label, id, room);
            labels.insert(id, label.clone());

            members.push(SimulatedMember {
                label,
                handle,
                notifications,
            });
        }

        let room_id = room_id.context("Mesh has no members")?;
        Ok(Self {
            room_id,
            members,
            labels,
        })
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn label(&self, index: usize) -> &str {
        &self.members[index].label
    }

    fn label_of(&self, id: &MemberId) -> String {
        self.labels
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Waits until every member reports an open channel to every other member.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let wanted = self.members.len() - 1;

        loop {
            let mut missing = Vec::new();
            for member in &self.members {
                let ready = member.handle.status().await?.ready_peers().len();
                if ready < wanted {
                    missing.push(format!("{} ({}/{})", member.label, ready, wanted));
                }
            }

            if missing.is_empty() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                anyhow::bail!("Mesh incomplete after {:?}: {}", timeout, missing.join(", "));
            }
            debug!("Waiting for {}", missing.join(", "));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn broadcast(&self, index: usize, text: &str) -> Result<usize> {
        let sent = self.members[index]
            .handle
            .broadcast(text.to_owned())
            .await?;
        Ok(sent)
    }

    /// Drains notifications until `expected` messages arrived or `timeout` passed.
    pub async fn collect_messages(&mut self, expected: usize, timeout: Duration) -> Vec<Delivery> {
        let deadline = Instant::now() + timeout;
        let mut deliveries = Vec::new();

        while deliveries.len() < expected && Instant::now() < deadline {
            let mut received = Vec::new();
            for member in &mut self.members {
                while let Ok(notification) = member.notifications.try_recv() {
                    received.push((member.label.clone(), notification));
                }
            }

            for (to, notification) in received {
                match notification {
                    MeshNotification::Message { from, data } => deliveries.push(Delivery {
                        from: self.label_of(&from),
                        to,
                        text: String::from_utf8_lossy(&data).into_owned(),
                    }),
                    MeshNotification::Connected(remote) => {
                        debug!("{} connected to {}", to, self.label_of(&remote))
                    }
                    MeshNotification::Disconnected(remote) => {
                        info!("{} lost {}", to, self.label_of(&remote))
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        deliveries
    }
}
