use crate::transport::PeerTransport;
use bytes::Bytes;
use dashmap::DashMap;
use futures::future::join_all;
use meshwork_core::MemberId;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) type ConnectedPeers = Arc<DashMap<MemberId, Arc<dyn PeerTransport>>>;

/// View of the connected peers, handed to [`MeshBehavior`](crate::MeshBehavior) callbacks.
/// Cheap to clone.
#[derive(Clone)]
pub struct MeshContext {
    peers: ConnectedPeers,
}

impl MeshContext {
    pub(crate) fn new(peers: ConnectedPeers) -> Self {
        Self { peers }
    }

    /// Send to one connected peer. Returns false when the peer is not connected or the
    /// send failed; nothing is buffered.
    pub async fn send(&self, remote: &MemberId, data: Bytes) -> bool {
        let Some(transport) = self.peers.get(remote).map(|entry| entry.value().clone()) else {
            debug!("Dropping message for unconnected peer {}", remote);
            return false;
        };

        match transport.send(&data).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send message to {}: {}", remote, e);
                false
            }
        }
    }

    /// Send to every peer connected right now. Returns how many sends succeeded.
    pub async fn broadcast(&self, data: Bytes) -> usize {
        // Release the map guards before awaiting.
        let targets: Vec<(MemberId, Arc<dyn PeerTransport>)> = self
            .peers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let results = join_all(targets.iter().map(|(remote, transport)| {
            let data = &data;
            async move { (remote, transport.send(data).await) }
        }))
        .await;

        results
            .into_iter()
            .filter(|(remote, result)| match result {
                Ok(()) => true,
                Err(e) => {
                    warn!("Broadcast to {} failed: {}", remote, e);
                    false
                }
            })
            .count()
    }

    pub fn list_peers(&self) -> Vec<MemberId> {
        self.peers.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn contains_peer(&self, remote: &MemberId) -> bool {
        self.peers.contains_key(remote)
    }
}
