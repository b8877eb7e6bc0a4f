use meshwork_core::{LinkState, Member, MemberId, Role, RoomId};

/// Snapshot of one pairwise connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub remote: MemberId,
    pub role: Role,
    pub state: LinkState,
    pub channel_open: bool,
    /// Remote candidates waiting for the remote description.
    pub pending_candidates: usize,
}

impl ConnectionStatus {
    /// Connected with the message channel open.
    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Connected && self.channel_open
    }
}

/// Snapshot of the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshStatus {
    pub room: Option<RoomId>,
    pub local: Option<Member>,
    pub connections: Vec<ConnectionStatus>,
}

impl MeshStatus {
    pub fn connection(&self, remote: &MemberId) -> Option<&ConnectionStatus> {
        self.connections.iter().find(|c| &c.remote == remote)
    }

    pub fn ready_peers(&self) -> Vec<MemberId> {
        self.connections
            .iter()
            .filter(|c| c.is_ready())
            .map(|c| c.remote.clone())
            .collect()
    }
}
