mod behavior;
mod context;
mod coordinator;
mod establisher;
mod handle;
mod mesh_command;
mod registry;
mod signal_event;
mod status;

pub use behavior::*;
pub use context::MeshContext;
pub use coordinator::*;
pub use handle::*;
pub use mesh_command::*;
pub use status::*;
