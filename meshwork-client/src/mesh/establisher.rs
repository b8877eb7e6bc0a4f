use crate::mesh::signal_event::SignalEvent;
use crate::store::{
    LinkRefs, RoomLayout, SignalingStore, Subscription, candidate_fields, link_answer_fields,
    link_offer_fields,
};
use crate::transport::{PeerState, PeerTransport, TransportEventSender, TransportFactory};
use meshwork_core::{
    IceCandidate, LinkState, MemberId, MeshError, PeerLink, Role, SessionDescription,
    TransportError,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Everything an establisher needs from its coordinator.
#[derive(Clone)]
pub(crate) struct LinkServices {
    pub store: Arc<dyn SignalingStore>,
    pub transports: Arc<dyn TransportFactory>,
    pub signal_tx: mpsc::UnboundedSender<SignalEvent>,
    pub transport_tx: TransportEventSender,
    pub channel_label: String,
}

/// What a transport state change meant for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateOutcome {
    Unchanged,
    /// Connected with the message channel open; the peer can be announced.
    Ready,
    Lost { was_ready: bool },
}

/// Negotiates one pairwise connection through the store.
///
/// The caller owns the link document: it writes the offer, publishes its candidates under
/// `ownerCandidates` and reads the callee's from `remoteCandidates`. The callee does the
/// mirror image. Remote candidates that arrive before the remote description is applied
/// are queued and flushed right after. Once connected, every subscription is dropped and
/// candidate exchange stops.
///
/// A connection is ready once the transport reports `Connected` and the message channel
/// is open. The two arrive in either order.
pub(crate) struct ConnectionEstablisher {
    local: MemberId,
    remote: MemberId,
    role: Role,
    state: LinkState,
    link: LinkRefs,
    transport: Arc<dyn PeerTransport>,
    store: Arc<dyn SignalingStore>,
    remote_description_applied: bool,
    pending_candidates: Vec<IceCandidate>,
    channel_open: bool,
    ready: bool,
    subscriptions: Vec<Subscription>,
}

impl ConnectionEstablisher {
    async fn open(
        services: &LinkServices,
        local: &MemberId,
        remote: &MemberId,
        role: Role,
        link: LinkRefs,
    ) -> Result<Self, MeshError> {
        let transport = services
            .transports
            .open(local, remote, services.transport_tx.clone())
            .await
            .map_err(|e| MeshError::negotiation(remote, e))?;

        Ok(Self {
            local: local.clone(),
            remote: remote.clone(),
            role,
            state: LinkState::New,
            link,
            transport,
            store: services.store.clone(),
            remote_description_applied: false,
            pending_candidates: Vec::new(),
            channel_open: false,
            ready: false,
            subscriptions: Vec::new(),
        })
    }

    /// Opens a link we own towards an earlier member and publishes the offer.
    pub async fn start_caller(
        services: &LinkServices,
        layout: &RoomLayout,
        local: &MemberId,
        remote: &MemberId,
    ) -> Result<Self, MeshError> {
        let link = layout.link(local, remote);
        let mut establisher = Self::open(services, local, remote, Role::Caller, link).await?;

        if let Err(e) = establisher.offer(services).await {
            establisher.close().await;
            return Err(e);
        }

        Ok(establisher)
    }

    /// Accepts a link a later member opened towards us.
    pub async fn start_callee(
        services: &LinkServices,
        layout: &RoomLayout,
        local: &MemberId,
        peer_link: PeerLink,
    ) -> Result<Self, MeshError> {
        let owner = peer_link.owner.clone();
        let link = layout.link(&owner, local);
        let mut establisher = Self::open(services, local, &owner, Role::Callee, link).await?;

        if let Err(e) = establisher.accept(services, peer_link).await {
            establisher.close().await;
            return Err(e);
        }

        Ok(establisher)
    }

    async fn offer(&mut self, services: &LinkServices) -> Result<(), MeshError> {
        self.state = LinkState::Offering;

        self.transport
            .open_channel(&services.channel_label)
            .await
            .map_err(|e| self.failed(e))?;
        let offer = self.transport.create_offer().await.map_err(|e| self.failed(e))?;
        self.transport
            .set_local_description(offer.clone())
            .await
            .map_err(|e| self.failed(e))?;

        self.store
            .set(&self.link.doc, link_offer_fields(&offer))
            .await?;
        info!("Offer published for link {} -> {}", self.local, self.remote);

        self.state = LinkState::AwaitingAnswer;

        let tx = services.signal_tx.clone();
        let remote = self.remote.clone();
        let answers = self
            .store
            .subscribe_document(
                &self.link.doc,
                Box::new(move |change| {
                    let _ = tx.send(SignalEvent::OwnLink {
                        remote: remote.clone(),
                        change,
                    });
                }),
            )
            .await?;
        self.subscriptions.push(answers);

        let candidates = self
            .watch_candidates(services, self.link.remote_candidates.clone())
            .await?;
        self.subscriptions.push(candidates);

        Ok(())
    }

    async fn accept(&mut self, services: &LinkServices, peer_link: PeerLink) -> Result<(), MeshError> {
        self.state = LinkState::AwaitingOffer;

        let candidates = self
            .watch_candidates(services, self.link.owner_candidates.clone())
            .await?;
        self.subscriptions.push(candidates);

        match peer_link.offer {
            Some(offer) => self.answer(offer).await,
            None => {
                debug!("Link from {} has no offer yet", self.remote);
                Ok(())
            }
        }
    }

    async fn watch_candidates(
        &self,
        services: &LinkServices,
        collection: crate::store::CollectionRef,
    ) -> Result<Subscription, MeshError> {
        let tx = services.signal_tx.clone();
        let remote = self.remote.clone();
        let subscription = self
            .store
            .subscribe_collection(
                &collection,
                Box::new(move |change| {
                    let _ = tx.send(SignalEvent::RemoteCandidate {
                        remote: remote.clone(),
                        change,
                    });
                }),
            )
            .await?;
        Ok(subscription)
    }

    async fn answer(&mut self, offer: SessionDescription) -> Result<(), MeshError> {
        self.state = LinkState::Answering;

        self.transport
            .set_remote_description(offer)
            .await
            .map_err(|e| self.failed(e))?;
        self.remote_description_applied = true;

        let answer = self.transport.create_answer().await.map_err(|e| self.failed(e))?;
        self.transport
            .set_local_description(answer.clone())
            .await
            .map_err(|e| self.failed(e))?;

        self.store
            .update(&self.link.doc, link_answer_fields(&answer))
            .await?;
        info!("Answer published for link {} -> {}", self.remote, self.local);

        self.state = LinkState::IceExchange;
        self.flush_pending_candidates().await
    }

    /// New contents of the link document.
    pub async fn on_link_update(&mut self, peer_link: PeerLink) -> Result<(), MeshError> {
        match (self.role, self.state) {
            (Role::Caller, LinkState::AwaitingAnswer) => {
                let Some(answer) = peer_link.answer else {
                    return Ok(());
                };

                self.transport
                    .set_remote_description(answer)
                    .await
                    .map_err(|e| self.failed(e))?;
                self.remote_description_applied = true;
                self.state = LinkState::IceExchange;
                debug!("Answer from {} applied", self.remote);

                self.flush_pending_candidates().await
            }
            (Role::Callee, LinkState::AwaitingOffer) => match peer_link.offer {
                Some(offer) => self.answer(offer).await,
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Candidate read from the far side's list.
    pub async fn on_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), MeshError> {
        if self.state.is_settled() {
            return Ok(());
        }

        if !self.remote_description_applied {
            debug!(
                "Queueing early candidate from {} ({} pending)",
                self.remote,
                self.pending_candidates.len() + 1
            );
            self.pending_candidates.push(candidate);
            return Ok(());
        }

        self.transport
            .add_ice_candidate(candidate)
            .await
            .map_err(|e| self.failed(e))
    }

    /// Candidate gathered by our transport; published to our side's list.
    pub async fn on_local_candidate(&mut self, candidate: IceCandidate) -> Result<(), MeshError> {
        if self.state.is_settled() {
            debug!("Ignoring local candidate for settled link with {}", self.remote);
            return Ok(());
        }

        let collection = match self.role {
            Role::Caller => &self.link.owner_candidates,
            Role::Callee => &self.link.remote_candidates,
        };
        self.store.append(collection, candidate_fields(&candidate)).await?;
        Ok(())
    }

    pub fn on_state_change(&mut self, state: PeerState) -> StateOutcome {
        match state {
            PeerState::Connected if !self.state.is_settled() => {
                self.state = LinkState::Connected;
                self.subscriptions.clear();
                self.pending_candidates.clear();
                info!("Connected to {} as {}", self.remote, self.role);
                if self.become_ready() {
                    StateOutcome::Ready
                } else {
                    debug!("Waiting for the message channel with {}", self.remote);
                    StateOutcome::Unchanged
                }
            }
            PeerState::Failed | PeerState::Closed if self.state != LinkState::Closed => {
                let was_ready = self.ready;
                self.state = LinkState::Closed;
                self.ready = false;
                StateOutcome::Lost { was_ready }
            }
            PeerState::Disconnected => {
                warn!("Connection to {} interrupted", self.remote);
                StateOutcome::Unchanged
            }
            _ => StateOutcome::Unchanged,
        }
    }

    fn become_ready(&mut self) -> bool {
        if self.ready || self.state != LinkState::Connected || !self.channel_open {
            return false;
        }
        self.ready = true;
        true
    }

    async fn flush_pending_candidates(&mut self) -> Result<(), MeshError> {
        let pending = std::mem::take(&mut self.pending_candidates);
        if !pending.is_empty() {
            debug!("Applying {} queued candidates from {}", pending.len(), self.remote);
        }

        for candidate in pending {
            self.transport
                .add_ice_candidate(candidate)
                .await
                .map_err(|e| self.failed(e))?;
        }
        Ok(())
    }

    fn failed(&self, source: TransportError) -> MeshError {
        MeshError::negotiation(&self.remote, source)
    }

    /// Stops watching the store and closes the transport. Store records are left in place.
    pub async fn close(&mut self) {
        self.state = LinkState::Closed;
        self.subscriptions.clear();
        self.pending_candidates.clear();
        self.channel_open = false;
        self.ready = false;

        if let Err(e) = self.transport.close().await {
            debug!("Closing transport to {} failed: {}", self.remote, e);
        }
    }

    /// Returns true when opening the channel made the connection ready.
    pub fn set_channel_open(&mut self, open: bool) -> bool {
        self.channel_open = open;
        open && self.become_ready()
    }

    pub fn remote(&self) -> &MemberId {
        &self.remote
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Whether the peer has been announced as connected.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn channel_open(&self) -> bool {
        self.channel_open
    }

    pub fn transport(&self) -> Arc<dyn PeerTransport> {
        self.transport.clone()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }
}
