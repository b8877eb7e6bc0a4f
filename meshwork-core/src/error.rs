use crate::model::{MemberId, RoomId};
use thiserror::Error;

/// Failures of the signaling document store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("signaling store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed document {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// Failures reported by a peer transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport setup failed: {0}")]
    Setup(String),
    #[error("negotiation rejected: {0}")]
    Negotiation(String),
    #[error("ice candidate rejected: {0}")]
    Candidate(String),
    #[error("message channel is not open")]
    ChannelNotOpen,
    #[error("send failed: {0}")]
    Send(String),
    #[error("transport closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("room {0} has no members")]
    RoomNotFound(RoomId),
    #[error(transparent)]
    SignalingUnavailable(#[from] StoreError),
    #[error("negotiation with {remote} failed: {source}")]
    NegotiationFailed {
        remote: MemberId,
        #[source]
        source: TransportError,
    },
    #[error("peer {0} unreachable")]
    PeerUnreachable(MemberId),
    #[error("already in room {0}")]
    AlreadyInRoom(RoomId),
    #[error("not in a room")]
    NotInRoom,
    #[error("mesh coordinator is not running")]
    CoordinatorClosed,
}

impl MeshError {
    pub fn negotiation(remote: &MemberId, source: TransportError) -> Self {
        MeshError::NegotiationFailed {
            remote: remote.clone(),
            source,
        }
    }
}
