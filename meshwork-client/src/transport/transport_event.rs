use bytes::Bytes;
use meshwork_core::{IceCandidate, MemberId};

/// Connection state as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Events a transport generates for the mesh coordinator, tagged with the remote member.
#[derive(Debug)]
pub enum TransportEvent {
    /// A local ICE candidate was gathered and must be published through signaling.
    CandidateGenerated(MemberId, IceCandidate),

    StateChanged(MemberId, PeerState),

    /// The message channel is open and can carry data.
    ChannelReady(MemberId),

    Message(MemberId, Bytes),

    ChannelClosed(MemberId),
}

impl TransportEvent {
    pub fn remote(&self) -> &MemberId {
        match self {
            TransportEvent::CandidateGenerated(id, _)
            | TransportEvent::StateChanged(id, _)
            | TransportEvent::ChannelReady(id)
            | TransportEvent::Message(id, _)
            | TransportEvent::ChannelClosed(id) => id,
        }
    }
}
