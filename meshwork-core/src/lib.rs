pub mod error;
pub mod model;

pub use error::{MeshError, StoreError, TransportError};
pub use model::*;
