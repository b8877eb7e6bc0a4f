use super::{PeerState, PeerTransport, TransportEvent, TransportEventSender, TransportFactory};
use crate::config::MeshConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use meshwork_core::{IceCandidate, IceServerConfig, MemberId, SessionDescription, TransportError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

type ChannelSlot = Arc<Mutex<Option<Arc<RTCDataChannel>>>>;

/// Opens webrtc-rs peer connections configured with the mesh's ICE servers.
///
/// Codecs, interceptors and ICE settings are registered once, in [`Self::new`], and the
/// resulting API is shared by every connection the factory opens.
#[derive(Clone)]
pub struct WebRtcTransportFactory {
    api: Arc<API>,
    ice_servers: Vec<IceServerConfig>,
}

impl WebRtcTransportFactory {
    pub fn new(config: &MeshConfig) -> Result<Self> {
        let api = Self::build_api(config.include_loopback_candidates)?;
        Ok(Self {
            api: Arc::new(api),
            ice_servers: config.ice_servers.clone(),
        })
    }

    fn build_api(include_loopback_candidates: bool) -> Result<API> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .context("Failed to register default codecs")?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .context("Failed to register interceptors")?;

        let mut setting_engine = SettingEngine::default();
        setting_engine.set_include_loopback_candidate(include_loopback_candidates);

        Ok(APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine)
            .build())
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn open(
        &self,
        _local: &MemberId,
        remote: &MemberId,
        events: TransportEventSender,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let peer_connection = self
            .api
            .new_peer_connection(self.rtc_configuration())
            .await
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        let transport = WebRtcTransport::new(remote.clone(), Arc::new(peer_connection), events);
        Ok(Arc::new(transport))
    }
}

pub struct WebRtcTransport {
    remote: MemberId,
    peer_connection: Arc<RTCPeerConnection>,
    channel: ChannelSlot,
    events: TransportEventSender,
}

impl WebRtcTransport {
    fn new(
        remote: MemberId,
        peer_connection: Arc<RTCPeerConnection>,
        events: TransportEventSender,
    ) -> Self {
        let channel: ChannelSlot = Arc::new(Mutex::new(None));

        let state_tx = events.clone();
        let state_remote = remote.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let remote = state_remote.clone();

                Box::pin(async move {
                    info!("Peer connection state for {}: {:?}", remote, s);
                    let state = match s {
                        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => {
                            PeerState::New
                        }
                        RTCPeerConnectionState::Connecting => PeerState::Connecting,
                        RTCPeerConnectionState::Connected => PeerState::Connected,
                        RTCPeerConnectionState::Disconnected => PeerState::Disconnected,
                        RTCPeerConnectionState::Failed => PeerState::Failed,
                        RTCPeerConnectionState::Closed => PeerState::Closed,
                    };
                    let _ = tx.send(TransportEvent::StateChanged(remote, state)).await;
                })
            },
        ));

        let ice_tx = events.clone();
        let ice_remote = remote.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let remote = ice_remote.clone();

            Box::pin(async move {
                let Some(candidate) = c else {
                    debug!("ICE gathering finished for {}", remote);
                    return;
                };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                };
                let _ = tx.send(TransportEvent::CandidateGenerated(remote, candidate)).await;
            })
        }));

        let dc_tx = events.clone();
        let dc_remote = remote.clone();
        let dc_slot = channel.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let remote = dc_remote.clone();
            let slot = dc_slot.clone();

            Box::pin(async move {
                debug!("Inbound data channel '{}' from {}", dc.label(), remote);
                wire_channel(&dc, &remote, &tx);
                *slot.lock().await = Some(dc);
            })
        }));

        Self {
            remote,
            peer_connection,
            channel,
            events,
        }
    }
}

fn wire_channel(dc: &Arc<RTCDataChannel>, remote: &MemberId, events: &TransportEventSender) {
    let tx_open = events.clone();
    let remote_open = remote.clone();
    dc.on_open(Box::new(move || {
        let tx = tx_open.clone();
        let remote = remote_open.clone();
        Box::pin(async move {
            info!("Data channel open for {}", remote);
            let _ = tx.send(TransportEvent::ChannelReady(remote)).await;
        })
    }));

    let tx_msg = events.clone();
    let remote_msg = remote.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = tx_msg.clone();
        let remote = remote_msg.clone();
        Box::pin(async move {
            let bytes = Bytes::from(msg.data.to_vec());
            let _ = tx.send(TransportEvent::Message(remote, bytes)).await;
        })
    }));

    let tx_close = events.clone();
    let remote_close = remote.clone();
    dc.on_close(Box::new(move || {
        let tx = tx_close.clone();
        let remote = remote_close.clone();
        Box::pin(async move {
            let _ = tx.send(TransportEvent::ChannelClosed(remote)).await;
        })
    }));
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription, TransportError> {
    let parsed = match description.kind {
        meshwork_core::SdpKind::Offer => RTCSessionDescription::offer(description.sdp),
        meshwork_core::SdpKind::Answer => RTCSessionDescription::answer(description.sdp),
    };
    parsed.map_err(|e| TransportError::Negotiation(e.to_string()))
}

fn from_rtc(description: RTCSessionDescription) -> Result<SessionDescription, TransportError> {
    match description.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(description.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(description.sdp)),
        other => Err(TransportError::Negotiation(format!(
            "unexpected sdp type {:?}",
            other
        ))),
    }
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;
        from_rtc(answer)
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        self.peer_connection
            .set_local_description(to_rtc(description)?)
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        self.peer_connection
            .set_remote_description(to_rtc(description)?)
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| TransportError::Candidate(e.to_string()))
    }

    async fn open_channel(&self, label: &str) -> Result<(), TransportError> {
        let dc = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        wire_channel(&dc, &self.remote, &self.events);
        *self.channel.lock().await = Some(dc);
        Ok(())
    }

    async fn send(&self, data: &Bytes) -> Result<(), TransportError> {
        let Some(dc) = self.channel.lock().await.clone() else {
            return Err(TransportError::ChannelNotOpen);
        };
        if dc.ready_state() != RTCDataChannelState::Open {
            return Err(TransportError::ChannelNotOpen);
        }
        dc.send(data)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.peer_connection
            .close()
            .await
            .map_err(|_| TransportError::Closed)
    }
}
