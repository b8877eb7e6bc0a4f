use crate::mesh::context::ConnectedPeers;
use crate::mesh::establisher::ConnectionEstablisher;
use crate::mesh::{ConnectionStatus, MeshContext};
use dashmap::DashMap;
use meshwork_core::MemberId;
use std::collections::HashMap;
use std::sync::Arc;

/// At most one connection per remote member, plus the set of those that are connected.
pub(crate) struct ConnectionRegistry {
    connections: HashMap<MemberId, ConnectionEstablisher>,
    connected: ConnectedPeers,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            connected: Arc::new(DashMap::new()),
        }
    }

    pub fn context(&self) -> MeshContext {
        MeshContext::new(self.connected.clone())
    }

    pub fn contains(&self, remote: &MemberId) -> bool {
        self.connections.contains_key(remote)
    }

    pub fn get_mut(&mut self, remote: &MemberId) -> Option<&mut ConnectionEstablisher> {
        self.connections.get_mut(remote)
    }

    pub fn insert(&mut self, connection: ConnectionEstablisher) {
        self.connections
            .insert(connection.remote().clone(), connection);
    }

    /// Exposes the connection's transport to [`MeshContext`] sends.
    pub fn mark_connected(&self, remote: &MemberId) {
        if let Some(connection) = self.connections.get(remote) {
            self.connected.insert(remote.clone(), connection.transport());
        }
    }

    pub fn remove(&mut self, remote: &MemberId) -> Option<ConnectionEstablisher> {
        self.connected.remove(remote);
        self.connections.remove(remote)
    }

    pub fn drain(&mut self) -> Vec<ConnectionEstablisher> {
        self.connected.clear();
        self.connections.drain().map(|(_, connection)| connection).collect()
    }

    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        let mut statuses: Vec<ConnectionStatus> = self
            .connections
            .values()
            .map(|connection| ConnectionStatus {
                remote: connection.remote().clone(),
                role: connection.role(),
                state: connection.state(),
                channel_open: connection.channel_open(),
                pending_candidates: connection.pending_candidates(),
            })
            .collect();
        statuses.sort_by(|a, b| a.remote.cmp(&b.remote));
        statuses
    }
}
