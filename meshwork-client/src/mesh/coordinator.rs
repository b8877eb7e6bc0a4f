use crate::config::MeshConfig;
use crate::mesh::establisher::{ConnectionEstablisher, LinkServices, StateOutcome};
use crate::mesh::mesh_command::MeshCommand;
use crate::mesh::registry::ConnectionRegistry;
use crate::mesh::signal_event::SignalEvent;
use crate::mesh::{MeshBehavior, MeshStatus};
use crate::store::{
    ChangeKind, DocChange, RoomLayout, SignalingStore, Subscription, join_fields,
    parse_candidate, parse_link, parse_member, room_fields,
};
use crate::transport::{TransportEvent, TransportFactory};
use meshwork_core::{JoinSeq, Member, MemberId, MeshError, Role, RoomId, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const TRANSPORT_EVENT_BUFFER: usize = 256;

/// Membership state while the coordinator is in a room.
struct RoomSession {
    layout: RoomLayout,
    local: Member,
    roster: HashMap<MemberId, Member>,
    members_watch: Option<Subscription>,
    /// Connections collections of later members, watched for links addressed to us.
    link_watches: HashMap<MemberId, Subscription>,
}

/// Event loop owning every connection of one local member.
///
/// Commands, store notifications and transport events are all handled here, one at a
/// time, so per-pair state needs no locking.
pub struct MeshCoordinator {
    behavior: Box<dyn MeshBehavior>,
    services: LinkServices,
    registry: ConnectionRegistry,
    command_rx: mpsc::Receiver<MeshCommand>,
    signal_rx: mpsc::UnboundedReceiver<SignalEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    session: Option<RoomSession>,
}

impl MeshCoordinator {
    pub fn new(
        behavior: Box<dyn MeshBehavior>,
        command_rx: mpsc::Receiver<MeshCommand>,
        store: Arc<dyn SignalingStore>,
        transports: Arc<dyn TransportFactory>,
        config: &MeshConfig,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_EVENT_BUFFER);

        Self {
            behavior,
            services: LinkServices {
                store,
                transports,
                signal_tx,
                transport_tx,
                channel_label: config.channel_label.clone(),
            },
            registry: ConnectionRegistry::new(),
            command_rx,
            signal_rx,
            transport_rx,
            session: None,
        }
    }

    pub async fn run(mut self) {
        info!("Mesh coordinator started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("All mesh handles dropped. Shutting down coordinator.");
                            break;
                        }
                    }
                }

                Some(evt) = self.signal_rx.recv() => {
                    self.handle_signal_event(evt).await;
                }

                Some(evt) = self.transport_rx.recv() => {
                    self.handle_transport_event(evt).await;
                }
            }
        }

        self.close_all().await;
        info!("Mesh coordinator finished");
    }

    async fn handle_command(&mut self, cmd: MeshCommand) {
        match cmd {
            MeshCommand::CreateRoom { reply } => {
                let result = self.create_room().await;
                let _ = reply.send(result);
            }

            MeshCommand::JoinRoom { room_id, reply } => {
                let result = self.join_room(room_id).await;
                let _ = reply.send(result);
            }

            MeshCommand::Broadcast { data, reply } => {
                let sent = self.registry.context().broadcast(data).await;
                debug!("Broadcast delivered to {} peers", sent);
                let _ = reply.send(sent);
            }

            MeshCommand::Send { remote, data, reply } => {
                let sent = self.registry.context().send(&remote, data).await;
                let _ = reply.send(sent);
            }

            MeshCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn status(&self) -> MeshStatus {
        MeshStatus {
            room: self.session.as_ref().map(|s| s.layout.room_id()),
            local: self.session.as_ref().map(|s| s.local.clone()),
            connections: self.registry.statuses(),
        }
    }

    fn ensure_outside_room(&self) -> Result<(), MeshError> {
        match &self.session {
            Some(session) => Err(MeshError::AlreadyInRoom(session.layout.room_id())),
            None => Ok(()),
        }
    }

    async fn create_room(&mut self) -> Result<RoomId, MeshError> {
        self.ensure_outside_room()?;
        let store = self.services.store.clone();

        let room_doc = store.create(&RoomLayout::rooms()).await?;
        let layout = RoomLayout::new(&RoomId::from(room_doc.id()));
        let member_doc = store.create(&layout.members()).await?;
        let local = Member::new(MemberId::from(member_doc.id()), JoinSeq::next());

        store
            .set(layout.room_doc(), room_fields(local.join_seq))
            .await?;
        let members_watch = self.watch_members(&layout).await?;
        store
            .set(&layout.member(&local.id), join_fields(local.join_seq))
            .await?;

        let room_id = layout.room_id();
        info!("Created room {} as member {}", room_id, local.id);

        self.session = Some(RoomSession {
            layout,
            local,
            roster: HashMap::new(),
            members_watch: Some(members_watch),
            link_watches: HashMap::new(),
        });

        Ok(room_id)
    }

    async fn join_room(&mut self, room_id: RoomId) -> Result<(), MeshError> {
        self.ensure_outside_room()?;
        let store = self.services.store.clone();
        let layout = RoomLayout::new(&room_id);

        let existing: Vec<Member> = store
            .list(&layout.members())
            .await?
            .iter()
            .filter_map(|doc| match parse_member(doc) {
                Ok(member) => Some(member),
                Err(e) => {
                    warn!("Skipping unreadable member record: {}", e);
                    None
                }
            })
            .collect();

        if existing.is_empty() {
            return Err(MeshError::RoomNotFound(room_id));
        }

        let member_doc = store.create(&layout.members()).await?;
        let local = Member::new(MemberId::from(member_doc.id()), JoinSeq::next());
        info!(
            "Joining room {} as member {} ({} members present)",
            room_id,
            local.id,
            existing.len()
        );

        self.session = Some(RoomSession {
            layout: layout.clone(),
            local: local.clone(),
            roster: HashMap::new(),
            members_watch: None,
            link_watches: HashMap::new(),
        });

        for remote in &existing {
            self.connect_to(remote).await;
        }

        if let Err(e) = self.register(&layout, &local).await {
            error!("Failed to register in room {}: {}", room_id, e);
            self.leave_session().await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn register(&mut self, layout: &RoomLayout, local: &Member) -> Result<(), StoreError> {
        self.services
            .store
            .set(&layout.member(&local.id), join_fields(local.join_seq))
            .await?;
        let members_watch = self.watch_members(layout).await?;

        if let Some(session) = self.session.as_mut() {
            session.members_watch = Some(members_watch);
        }
        Ok(())
    }

    /// Drops the session after a failed join. Store records are left in place.
    async fn leave_session(&mut self) {
        if let Some(RoomSession {
            layout,
            members_watch,
            link_watches,
            ..
        }) = self.session.take()
        {
            drop(members_watch);
            debug!(
                "Left room {}, dropped {} link watches",
                layout.room_id(),
                link_watches.len()
            );
        }
        self.close_all().await;
    }

    async fn watch_members(&self, layout: &RoomLayout) -> Result<Subscription, StoreError> {
        let tx = self.services.signal_tx.clone();
        self.services
            .store
            .subscribe_collection(
                &layout.members(),
                Box::new(move |change| {
                    let _ = tx.send(SignalEvent::Member(change));
                }),
            )
            .await
    }

    /// Starts the connection to `remote` appropriate for our role in the pair.
    async fn connect_to(&mut self, remote: &Member) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if remote.id == session.local.id || session.roster.contains_key(&remote.id) {
            return;
        }
        session.roster.insert(remote.id.clone(), remote.clone());

        let layout = session.layout.clone();
        let local = session.local.clone();

        match Role::for_pair(&local, remote) {
            Role::Caller => {
                if !self.registry.contains(&remote.id) {
                    self.start_caller(&layout, &local.id, &remote.id).await;
                }
            }
            Role::Callee => self.watch_links_of(&layout, &remote.id).await,
        }
    }

    async fn start_caller(&mut self, layout: &RoomLayout, local: &MemberId, remote: &MemberId) {
        debug!("Opening link {} -> {}", local, remote);

        match ConnectionEstablisher::start_caller(&self.services, layout, local, remote).await {
            Ok(connection) => self.registry.insert(connection),
            Err(e) => warn!("Abandoned connection to {}: {}", remote, e),
        }
    }

    async fn watch_links_of(&mut self, layout: &RoomLayout, owner: &MemberId) {
        let already_watched = self
            .session
            .as_ref()
            .is_some_and(|session| session.link_watches.contains_key(owner));
        if already_watched {
            return;
        }

        let tx = self.services.signal_tx.clone();
        let event_owner = owner.clone();

        let watch = self
            .services
            .store
            .subscribe_collection(
                &layout.connections(owner),
                Box::new(move |change| {
                    let _ = tx.send(SignalEvent::Link {
                        owner: event_owner.clone(),
                        change,
                    });
                }),
            )
            .await;

        match watch {
            Ok(subscription) => {
                if let Some(session) = self.session.as_mut() {
                    session.link_watches.insert(owner.clone(), subscription);
                }
            }
            Err(e) => warn!("Cannot watch links opened by {}: {}", owner, e),
        }
    }

    async fn handle_signal_event(&mut self, event: SignalEvent) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let local = session.local.id.clone();
        let layout = session.layout.clone();

        match event {
            SignalEvent::Member(change) => {
                if change.kind != ChangeKind::Added {
                    return;
                }
                match parse_member(&change.document) {
                    Ok(member) => {
                        let known = member.id == local || session.roster.contains_key(&member.id);
                        if !known {
                            info!("Member {} joined room {}", member.id, layout.room_id());
                            self.connect_to(&member).await;
                        }
                    }
                    Err(e) => warn!("Ignoring unreadable member record: {}", e),
                }
            }

            SignalEvent::Link { owner, change } => {
                // The owner's other links are not ours to answer.
                if change.document.id() != local.as_str() {
                    return;
                }
                self.handle_incoming_link(&layout, &local, owner, change).await;
            }

            SignalEvent::OwnLink { remote, change } => {
                if change.kind == ChangeKind::Removed {
                    return;
                }
                let link = match parse_link(&local, &change.document) {
                    Ok(link) => link,
                    Err(e) => {
                        warn!("Ignoring unreadable link record: {}", e);
                        return;
                    }
                };
                let Some(connection) = self.registry.get_mut(&remote) else {
                    return;
                };
                if let Err(e) = connection.on_link_update(link).await {
                    self.abandon(&remote, e).await;
                }
            }

            SignalEvent::RemoteCandidate { remote, change } => {
                if change.kind != ChangeKind::Added {
                    return;
                }
                let candidate = match parse_candidate(&change.document) {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        warn!("Ignoring unreadable candidate from {}: {}", remote, e);
                        return;
                    }
                };
                let Some(connection) = self.registry.get_mut(&remote) else {
                    return;
                };
                if let Err(e) = connection.on_remote_candidate(candidate).await {
                    self.abandon(&remote, e).await;
                }
            }
        }
    }

    async fn handle_incoming_link(
        &mut self,
        layout: &RoomLayout,
        local: &MemberId,
        owner: MemberId,
        change: DocChange,
    ) {
        let link = match parse_link(&owner, &change.document) {
            Ok(link) => link,
            Err(e) => {
                warn!("Ignoring unreadable link from {}: {}", owner, e);
                return;
            }
        };

        if change.kind == ChangeKind::Removed {
            debug!("Link from {} removed", owner);
            return;
        }

        if let Some(connection) = self.registry.get_mut(&owner) {
            if let Err(e) = connection.on_link_update(link).await {
                self.abandon(&owner, e).await;
            }
            return;
        }

        // A modification without a connection belongs to a link we already gave up on.
        if change.kind == ChangeKind::Added {
            info!("Incoming link from {}", owner);
            match ConnectionEstablisher::start_callee(&self.services, layout, local, link).await {
                Ok(connection) => self.registry.insert(connection),
                Err(e) => warn!("Abandoned connection to {}: {}", owner, e),
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        let remote = event.remote().clone();
        let Some(connection) = self.registry.get_mut(&remote) else {
            debug!("Dropping transport event for unknown peer {}", remote);
            return;
        };

        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                if let Err(e) = connection.on_local_candidate(candidate).await {
                    self.abandon(&remote, e).await;
                }
            }

            TransportEvent::StateChanged(_, state) => match connection.on_state_change(state) {
                StateOutcome::Ready => self.announce(remote).await,
                StateOutcome::Lost { was_ready } => {
                    self.remove(&remote, was_ready).await;
                }
                StateOutcome::Unchanged => {}
            },

            TransportEvent::ChannelReady(_) => {
                debug!("Message channel with {} open", remote);
                if connection.set_channel_open(true) {
                    self.announce(remote).await;
                }
            }

            TransportEvent::Message(_, data) => {
                let ctx = self.registry.context();
                self.behavior.on_message(&ctx, remote, data).await;
            }

            TransportEvent::ChannelClosed(_) => {
                debug!("Message channel with {} closed", remote);
                connection.set_channel_open(false);
            }
        }
    }

    /// Makes a ready peer reachable through context sends, then tells the behavior.
    async fn announce(&mut self, remote: MemberId) {
        self.registry.mark_connected(&remote);
        let ctx = self.registry.context();
        self.behavior.on_connect(&ctx, remote).await;
    }

    /// Gives up on one pair after a negotiation or signaling failure.
    async fn abandon(&mut self, remote: &MemberId, reason: MeshError) {
        warn!("Abandoning connection to {}: {}", remote, reason);
        let was_ready = self
            .registry
            .get_mut(remote)
            .is_some_and(|connection| connection.is_ready());
        self.remove(remote, was_ready).await;
    }

    async fn remove(&mut self, remote: &MemberId, was_ready: bool) {
        let Some(mut connection) = self.registry.remove(remote) else {
            return;
        };
        connection.close().await;

        if was_ready {
            info!("Peer {} disconnected", remote);
            let ctx = self.registry.context();
            self.behavior.on_disconnect(&ctx, remote.clone()).await;
        } else {
            warn!("{}", MeshError::PeerUnreachable(remote.clone()));
        }
    }

    async fn close_all(&mut self) {
        for mut connection in self.registry.drain() {
            connection.close().await;
        }
    }
}
