//! The connection manager: a handle, the actor behind it, and its events.
//!
//! 连接管理器：句柄、其背后的actor以及其事件。
mod actor;
pub mod command;
pub mod event;
pub mod handle;
pub mod state;

pub use command::Observer;
pub use event::{ConnectTrigger, ConnectionEvent};
pub use handle::ConnectionManager;
pub use state::{ConnectionState, ManagerSnapshot};
