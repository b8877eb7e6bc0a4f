mod config;
pub mod mesh;
pub mod store;
pub mod transport;

pub use config::MeshConfig;
pub use mesh::{
    ConnectionStatus, MeshBehavior, MeshContext, MeshHandle, MeshNotification, MeshStatus,
    NotificationBehavior,
};
pub use store::{MemoryStore, SignalingStore};
pub use transport::{LoopbackNetwork, PeerTransport, TransportFactory, WebRtcTransportFactory};
