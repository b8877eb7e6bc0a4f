pub use meshwork_core::{MemberId, MeshError, RoomId};

pub mod model {
    pub use meshwork_core::model::*;
    pub use meshwork_core::{StoreError, TransportError};
}

#[cfg(feature = "client")]
pub mod client {
    pub use meshwork_client::*;
}
