use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque member identifier, allocated by the signaling store when the member registers.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static LAST_JOIN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Join timestamp in microseconds since the unix epoch.
///
/// Values handed out by [`JoinSeq::next`] are strictly increasing within one process,
/// even when the wall clock stalls or steps backwards.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct JoinSeq(pub u64);

impl JoinSeq {
    pub fn next() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();

        let mut last = LAST_JOIN_SEQ.load(AtomicOrdering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match LAST_JOIN_SEQ.compare_exchange_weak(
                last,
                candidate,
                AtomicOrdering::AcqRel,
                AtomicOrdering::Relaxed,
            ) {
                Ok(_) => return Self(candidate),
                Err(actual) => last = actual,
            }
        }
    }
}

/// One participant's registration in a room.
#[derive(Debug, Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct Member {
    pub id: MemberId,
    pub join_seq: JoinSeq,
}

impl Member {
    pub fn new(id: MemberId, join_seq: JoinSeq) -> Self {
        Self { id, join_seq }
    }

    /// The member that owns (and offers on) the link between `self` and `other`:
    /// always the later joiner.
    pub fn link_owner<'a>(&'a self, other: &'a Member) -> &'a Member {
        if self > other { self } else { other }
    }
}

/// Members are totally ordered by join sequence, ties broken by id.
impl Ord for Member {
    fn cmp(&self, other: &Self) -> Ordering {
        self.join_seq
            .cmp(&other.join_seq)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Member {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Handshake role of the local side for one pair.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum Role {
    /// Later joiner: owns the link and writes the offer.
    Caller,
    /// Earlier joiner: answers the offer found under the caller's record.
    Callee,
}

impl Role {
    pub fn for_pair(local: &Member, remote: &Member) -> Self {
        if local > remote {
            Role::Caller
        } else {
            Role::Callee
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Caller => write!(f, "caller"),
            Role::Callee => write!(f, "callee"),
        }
    }
}
