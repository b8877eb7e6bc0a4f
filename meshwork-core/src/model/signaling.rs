use crate::model::member::MemberId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Session description as stored in a peer link: `{ "type": "offer", "sdp": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Trickle ICE candidate in the browser's `RTCIceCandidateInit` JSON shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

/// Negotiation fields of the signaling record for one member pair.
///
/// The record lives under `owner`'s member document keyed by `remote`; the owner is
/// always the later joiner. Candidate lists are separate append-only collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerLink {
    pub owner: MemberId,
    pub remote: MemberId,
    pub offer: Option<SessionDescription>,
    pub answer: Option<SessionDescription>,
}

impl PeerLink {
    pub fn new(owner: MemberId, remote: MemberId) -> Self {
        Self {
            owner,
            remote,
            offer: None,
            answer: None,
        }
    }
}

/// Handshake progress of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    New,
    Offering,
    AwaitingOffer,
    Answering,
    AwaitingAnswer,
    IceExchange,
    Connected,
    Closed,
}

impl LinkState {
    /// Signaling is finished once connected or closed.
    pub fn is_settled(self) -> bool {
        matches!(self, LinkState::Connected | LinkState::Closed)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::New => "new",
            LinkState::Offering => "offering",
            LinkState::AwaitingOffer => "awaiting-offer",
            LinkState::Answering => "answering",
            LinkState::AwaitingAnswer => "awaiting-answer",
            LinkState::IceExchange => "ice-exchange",
            LinkState::Connected => "connected",
            LinkState::Closed => "closed",
        };
        f.write_str(name)
    }
}
