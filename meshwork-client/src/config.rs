use meshwork_core::IceServerConfig;
use serde::Deserialize;

/// Mesh configuration. Every field has a default, so a partial JSON document is enough.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// Label of the message channel the offering side creates.
    pub channel_label: String,
    /// Capacity of the handle -> coordinator command queue.
    pub command_buffer: usize,
    /// Gather candidates on loopback interfaces too, so members on one host can connect
    /// without any other network.
    pub include_loopback_candidates: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec!["stun:stun.l.google.com:19302".to_owned()],
                username: None,
                credential: None,
            }],
            channel_label: "mesh".to_owned(),
            command_buffer: 100,
            include_loopback_candidates: false,
        }
    }
}

impl MeshConfig {
    /// Defaults without any ICE server, for host-only connectivity.
    pub fn local() -> Self {
        Self {
            ice_servers: Vec::new(),
            include_loopback_candidates: true,
            ..Self::default()
        }
    }
}
