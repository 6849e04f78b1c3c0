//! Single push channel: socket ownership, lifecycle, heartbeat, dispatch

pub mod callbacks;
pub mod core;
pub mod endpoint;
pub mod manager;
pub mod state;

pub use callbacks::ConnectionCallbacks;
pub use core::{ConnectionOptions, HeartbeatConnection};
pub use endpoint::{ChannelEndpoint, DashboardEndpoint, TaskEndpoint};
pub use manager::ConnectionManager;
pub use state::{CloseCause, ConnectionState, TaskFault};
