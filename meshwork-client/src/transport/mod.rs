mod loopback;
mod transport_event;
mod webrtc_transport;

pub use loopback::{LoopbackNetwork, LoopbackTransport};
pub use transport_event::{PeerState, TransportEvent};
pub use webrtc_transport::{WebRtcTransport, WebRtcTransportFactory};

use async_trait::async_trait;
use bytes::Bytes;
use meshwork_core::{IceCandidate, MemberId, SessionDescription, TransportError};
use std::sync::Arc;
use tokio::sync::mpsc;

pub type TransportEventSender = mpsc::Sender<TransportEvent>;

/// One negotiable peer connection with an ordered, reliable message channel.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;

    /// Create the message channel locally (offering side). The answering side receives it
    /// through [`TransportEvent::ChannelReady`].
    async fn open_channel(&self, label: &str) -> Result<(), TransportError>;

    async fn send(&self, data: &Bytes) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Opens transports; every event of the returned transport goes to `events`.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(
        &self,
        local: &MemberId,
        remote: &MemberId,
        events: TransportEventSender,
    ) -> Result<Arc<dyn PeerTransport>, TransportError>;
}
