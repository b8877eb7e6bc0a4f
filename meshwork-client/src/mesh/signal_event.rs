use crate::store::DocChange;
use meshwork_core::MemberId;

/// Store notifications, tagged with the subscription that produced them.
#[derive(Debug)]
pub(crate) enum SignalEvent {
    /// Change in the room's members collection.
    Member(DocChange),

    /// Change in the connections collection of a later member (`owner`).
    Link { owner: MemberId, change: DocChange },

    /// Change of a link document we own, watched for the answer.
    OwnLink { remote: MemberId, change: DocChange },

    /// Candidate published by the far side of the link with `remote`.
    RemoteCandidate { remote: MemberId, change: DocChange },
}
