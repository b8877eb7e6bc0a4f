use super::{CollectionRef, DocumentRef};
use meshwork_core::{MemberId, RoomId};

const ROOMS: &str = "rooms";
const MEMBERS: &str = "members";
const CONNECTIONS: &str = "connections";
const OWNER_CANDIDATES: &str = "ownerCandidates";
const REMOTE_CANDIDATES: &str = "remoteCandidates";

/// Document paths of one room:
///
/// ```text
/// rooms/{room}/members/{member}
/// rooms/{room}/members/{owner}/connections/{remote}
/// rooms/{room}/members/{owner}/connections/{remote}/ownerCandidates/{auto}
/// rooms/{room}/members/{owner}/connections/{remote}/remoteCandidates/{auto}
/// ```
#[derive(Debug, Clone)]
pub struct RoomLayout {
    room: DocumentRef,
}

impl RoomLayout {
    pub fn rooms() -> CollectionRef {
        CollectionRef::root(ROOMS)
    }

    pub fn new(room_id: &RoomId) -> Self {
        Self {
            room: Self::rooms().doc(room_id.as_str()),
        }
    }

    pub fn room_id(&self) -> RoomId {
        RoomId::from(self.room.id())
    }

    pub fn room_doc(&self) -> &DocumentRef {
        &self.room
    }

    pub fn members(&self) -> CollectionRef {
        self.room.collection(MEMBERS)
    }

    pub fn member(&self, id: &MemberId) -> DocumentRef {
        self.members().doc(id.as_str())
    }

    /// Links owned by `owner`, one per earlier member.
    pub fn connections(&self, owner: &MemberId) -> CollectionRef {
        self.member(owner).collection(CONNECTIONS)
    }

    pub fn link(&self, owner: &MemberId, remote: &MemberId) -> LinkRefs {
        let doc = self.connections(owner).doc(remote.as_str());
        LinkRefs {
            owner_candidates: doc.collection(OWNER_CANDIDATES),
            remote_candidates: doc.collection(REMOTE_CANDIDATES),
            doc,
        }
    }
}

/// Store locations of one peer link.
#[derive(Debug, Clone)]
pub struct LinkRefs {
    pub doc: DocumentRef,
    pub owner_candidates: CollectionRef,
    pub remote_candidates: CollectionRef,
}
