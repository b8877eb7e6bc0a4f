//! In-process transport: a shared broker pairs the two ends of every member pair.
//!
//! Negotiation is modelled closely enough to exercise the signaling path. A pair connects
//! only after both ends hold a local and a remote description and each has applied at
//! least one remote candidate; candidates added before the remote description are
//! rejected, as a browser would. Closing a connected end makes the other end fail.
//!
//! Every event raised under the network lock is queued without waiting; a full queue
//! drops the event with a warning.

use super::{PeerState, PeerTransport, TransportEvent, TransportEventSender, TransportFactory};
use async_trait::async_trait;
use bytes::Bytes;
use meshwork_core::{IceCandidate, MemberId, SdpKind, SessionDescription, TransportError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

const CANDIDATES_PER_DESCRIPTION: usize = 2;

type EndpointKey = (MemberId, MemberId);

struct Endpoint {
    events: TransportEventSender,
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    applied_candidates: usize,
    channel_label: Option<String>,
    connected: bool,
    channel_open: bool,
    closed: bool,
}

impl Endpoint {
    fn emit(&self, event: TransportEvent) {
        if let Err(TrySendError::Full(event)) = self.events.try_send(event) {
            warn!("[Loopback] Event queue full, dropping {:?}", event);
        }
    }

    fn open_channel(&mut self, remote: &MemberId) {
        self.channel_open = true;
        self.emit(TransportEvent::ChannelReady(remote.clone()));
    }

    fn ready(&self) -> bool {
        !self.closed
            && !self.connected
            && self.local_description.is_some()
            && self.remote_description.is_some()
            && self.applied_candidates > 0
    }
}

#[derive(Default)]
struct NetworkInner {
    endpoints: HashMap<EndpointKey, Endpoint>,
    failing_remote_descriptions: usize,
    hold_channels: bool,
    next_port: u16,
}

impl NetworkInner {
    fn endpoint(&mut self, key: &EndpointKey) -> Result<&mut Endpoint, TransportError> {
        self.endpoints
            .get_mut(key)
            .filter(|e| !e.closed)
            .ok_or(TransportError::Closed)
    }

    fn try_connect(&mut self, key: &EndpointKey) {
        let peer_key = (key.1.clone(), key.0.clone());
        let both_ready = matches!(
            (self.endpoints.get(key), self.endpoints.get(&peer_key)),
            (Some(a), Some(b)) if a.ready() && b.ready()
        );
        if !both_ready {
            return;
        }

        debug!("[Loopback] {} <-> {} connected", key.0, key.1);
        let hold_channels = self.hold_channels;
        for (local, remote) in [key.clone(), peer_key] {
            if let Some(endpoint) = self.endpoints.get_mut(&(local, remote.clone())) {
                endpoint.connected = true;
                endpoint.emit(TransportEvent::StateChanged(
                    remote.clone(),
                    PeerState::Connected,
                ));
                if !hold_channels {
                    endpoint.open_channel(&remote);
                }
            }
        }
    }
}

/// Shared broker for [`LoopbackTransport`]s. Clones share the same network.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    inner: Arc<Mutex<NetworkInner>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` remote-description applications fail, on any endpoint.
    pub async fn fail_next_remote_descriptions(&self, count: usize) {
        self.inner.lock().await.failing_remote_descriptions = count;
    }

    /// Pairs that connect from now on report `Connected` but keep their message channel
    /// closed until [`Self::release_channels`].
    pub async fn hold_channels(&self) {
        self.inner.lock().await.hold_channels = true;
    }

    /// Opens every held channel and stops holding new ones.
    pub async fn release_channels(&self) {
        let mut inner = self.inner.lock().await;
        inner.hold_channels = false;
        for ((_, remote), endpoint) in inner.endpoints.iter_mut() {
            if endpoint.connected && !endpoint.closed && !endpoint.channel_open {
                endpoint.open_channel(remote);
            }
        }
    }

    /// Whether the pair currently has a live connection.
    pub async fn is_connected(&self, a: &MemberId, b: &MemberId) -> bool {
        let inner = self.inner.lock().await;
        inner
            .endpoints
            .get(&(a.clone(), b.clone()))
            .is_some_and(|e| e.connected && !e.closed)
    }
}

#[async_trait]
impl TransportFactory for LoopbackNetwork {
    async fn open(
        &self,
        local: &MemberId,
        remote: &MemberId,
        events: TransportEventSender,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let key = (local.clone(), remote.clone());
        self.inner.lock().await.endpoints.insert(
            key.clone(),
            Endpoint {
                events,
                local_description: None,
                remote_description: None,
                applied_candidates: 0,
                channel_label: None,
                connected: false,
                channel_open: false,
                closed: false,
            },
        );

        Ok(Arc::new(LoopbackTransport {
            network: self.clone(),
            key,
        }))
    }
}

/// One end of a loopback pair, as seen from `key.0` towards `key.1`.
pub struct LoopbackTransport {
    network: LoopbackNetwork,
    key: EndpointKey,
}

impl LoopbackTransport {
    fn session_line(&self) -> String {
        format!("o=loopback {} {}", self.key.0, self.key.1)
    }
}

#[async_trait]
impl PeerTransport for LoopbackTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        let mut inner = self.network.inner.lock().await;
        inner.endpoint(&self.key)?;
        Ok(SessionDescription::offer(format!(
            "v=0\r\n{}\r\n",
            self.session_line()
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        let mut inner = self.network.inner.lock().await;
        let endpoint = inner.endpoint(&self.key)?;
        match &endpoint.remote_description {
            Some(d) if d.kind == SdpKind::Offer => Ok(SessionDescription::answer(format!(
                "v=0\r\n{}\r\n",
                self.session_line()
            ))),
            _ => Err(TransportError::Negotiation(
                "cannot answer without a remote offer".into(),
            )),
        }
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        let mut inner = self.network.inner.lock().await;
        inner.next_port = inner.next_port.wrapping_add(CANDIDATES_PER_DESCRIPTION as u16);
        let base_port = 40000u16.wrapping_add(inner.next_port);

        let endpoint = inner.endpoint(&self.key)?;
        endpoint.local_description = Some(description);

        for n in 0..CANDIDATES_PER_DESCRIPTION {
            let candidate = IceCandidate {
                candidate: format!(
                    "candidate:{} 1 udp 2130706431 127.0.0.1 {} typ host",
                    n + 1,
                    base_port.wrapping_add(n as u16)
                ),
                sdp_mid: Some("0".into()),
                sdp_m_line_index: Some(0),
                username_fragment: None,
            };
            endpoint.emit(TransportEvent::CandidateGenerated(self.key.1.clone(), candidate));
        }

        inner.try_connect(&self.key);
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        let mut inner = self.network.inner.lock().await;
        if inner.failing_remote_descriptions > 0 {
            inner.failing_remote_descriptions -= 1;
            return Err(TransportError::Negotiation("injected failure".into()));
        }

        // The far end wrote "o=loopback {its id} {our id}".
        let expected = format!("o=loopback {} {}", self.key.1, self.key.0);
        if !description.sdp.contains(&expected) {
            return Err(TransportError::Negotiation(format!(
                "description does not belong to {} -> {}",
                self.key.1, self.key.0
            )));
        }

        let endpoint = inner.endpoint(&self.key)?;
        endpoint.remote_description = Some(description);
        inner.try_connect(&self.key);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        let mut inner = self.network.inner.lock().await;
        let endpoint = inner.endpoint(&self.key)?;
        if endpoint.remote_description.is_none() {
            return Err(TransportError::Candidate(format!(
                "remote description not set for {}",
                candidate.candidate
            )));
        }
        endpoint.applied_candidates += 1;
        inner.try_connect(&self.key);
        Ok(())
    }

    async fn open_channel(&self, label: &str) -> Result<(), TransportError> {
        let mut inner = self.network.inner.lock().await;
        inner.endpoint(&self.key)?.channel_label = Some(label.to_owned());
        Ok(())
    }

    async fn send(&self, data: &Bytes) -> Result<(), TransportError> {
        let peer_events = {
            let inner = self.network.inner.lock().await;
            let open = inner
                .endpoints
                .get(&self.key)
                .is_some_and(|e| e.connected && e.channel_open && !e.closed);
            if !open {
                return Err(TransportError::ChannelNotOpen);
            }

            let peer_key = (self.key.1.clone(), self.key.0.clone());
            let Some(peer) = inner.endpoints.get(&peer_key).filter(|e| !e.closed) else {
                return Err(TransportError::Closed);
            };
            peer.events.clone()
        };

        // Outside the lock: the far end's coordinator may need it to drain its queue.
        peer_events
            .send(TransportEvent::Message(self.key.0.clone(), data.clone()))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut inner = self.network.inner.lock().await;
        let Some(endpoint) = inner.endpoints.get_mut(&self.key) else {
            return Ok(());
        };
        if endpoint.closed {
            return Ok(());
        }
        endpoint.closed = true;
        endpoint.channel_open = false;
        let was_connected = endpoint.connected;
        endpoint.emit(TransportEvent::StateChanged(
            self.key.1.clone(),
            PeerState::Closed,
        ));

        if !was_connected {
            return Ok(());
        }
        let peer_key = (self.key.1.clone(), self.key.0.clone());
        if let Some(peer) = inner.endpoints.get_mut(&peer_key).filter(|p| !p.closed) {
            peer.channel_open = false;
            peer.emit(TransportEvent::ChannelClosed(self.key.0.clone()));
            for state in [PeerState::Disconnected, PeerState::Failed] {
                peer.emit(TransportEvent::StateChanged(self.key.0.clone(), state));
            }
        }
        Ok(())
    }
}
