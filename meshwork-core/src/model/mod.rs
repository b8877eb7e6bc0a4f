mod member;
mod room;
mod signaling;

pub use member::{JoinSeq, Member, MemberId, Role};
pub use room::RoomId;
pub use signaling::{IceCandidate, IceServerConfig, LinkState, PeerLink, SdpKind, SessionDescription};
