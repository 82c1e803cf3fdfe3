#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the persistent connection manager library.
//! 持久连接管理库的根。

pub mod config;
pub mod error;
pub mod manager;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::{Config, Endpoint};
pub use error::{Error, Result};
pub use manager::{ConnectionEvent, ConnectionManager, ConnectionState};
pub use transport::Payload;
