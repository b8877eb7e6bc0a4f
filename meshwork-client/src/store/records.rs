use super::{Document, Fields};
use meshwork_core::{
    IceCandidate, JoinSeq, Member, MemberId, PeerLink, SessionDescription, StoreError,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomRecord {
    created_seq: JoinSeq,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberRecord {
    join_seq: JoinSeq,
}

#[derive(Serialize, Deserialize, Default)]
struct LinkRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    offer: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    answer: Option<SessionDescription>,
}

fn to_fields<T: Serialize>(value: &T) -> Fields {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Fields::new(),
    }
}

fn from_document<T: DeserializeOwned>(doc: &Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(doc.fields.clone())).map_err(|e| StoreError::Malformed {
        path: doc.reference.path(),
        reason: e.to_string(),
    })
}

pub fn room_fields(created_seq: JoinSeq) -> Fields {
    to_fields(&RoomRecord { created_seq })
}

pub fn join_fields(join_seq: JoinSeq) -> Fields {
    to_fields(&MemberRecord { join_seq })
}

pub fn parse_member(doc: &Document) -> Result<Member, StoreError> {
    let record: MemberRecord = from_document(doc)?;
    Ok(Member::new(MemberId::from(doc.id()), record.join_seq))
}

pub fn link_offer_fields(offer: &SessionDescription) -> Fields {
    to_fields(&LinkRecord {
        offer: Some(offer.clone()),
        answer: None,
    })
}

pub fn link_answer_fields(answer: &SessionDescription) -> Fields {
    to_fields(&LinkRecord {
        offer: None,
        answer: Some(answer.clone()),
    })
}

/// Reads a link document found under `owner`'s connections.
pub fn parse_link(owner: &MemberId, doc: &Document) -> Result<PeerLink, StoreError> {
    let record: LinkRecord = from_document(doc)?;
    Ok(PeerLink {
        owner: owner.clone(),
        remote: MemberId::from(doc.id()),
        offer: record.offer,
        answer: record.answer,
    })
}

pub fn candidate_fields(candidate: &IceCandidate) -> Fields {
    to_fields(candidate)
}

pub fn parse_candidate(doc: &Document) -> Result<IceCandidate, StoreError> {
    from_document(doc)
}
