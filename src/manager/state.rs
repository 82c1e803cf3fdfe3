//! The lifecycle state of the managed connection.
//! 受管连接的生命周期状态。

use std::fmt;

/// The lifecycle state of a [`ConnectionManager`](super::ConnectionManager).
///
/// ```text
/// Idle -----connect()-----> Connecting
/// Connecting --open ok-----> Open
/// Connecting --open error--> Closed
/// Open --peer close--------> Closed
/// Open --close()-----------> Idle
/// Closed --connect()-------> Connecting
/// ```
///
/// 管理器的生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No link has been opened yet, or `close()` reset the manager.
    /// 尚未打开链路，或 `close()` 重置了管理器。
    #[default]
    Idle,
    /// A connection attempt is in flight.
    /// 连接尝试正在进行中。
    Connecting,
    /// The link is open and messages are written immediately.
    /// 链路已打开，消息会被立即写入。
    Open,
    /// The last attempt failed or the open link was lost.
    /// 上一次尝试失败或已打开的链路丢失。
    Closed,
}

impl ConnectionState {
    /// Whether a new connection attempt may start from this state.
    ///
    /// 是否可以从此状态开始新的连接尝试。
    pub fn can_start_attempt(self) -> bool {
        matches!(self, ConnectionState::Idle | ConnectionState::Closed)
    }

    /// Whether outbound messages must be queued in this state.
    /// 在此状态下出站消息是否必须排队。
    pub fn queues_outbound(self) -> bool {
        self != ConnectionState::Open
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A point-in-time view of the manager's bookkeeping.
///
/// 管理器内部状态的时间点视图。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSnapshot {
    pub state: ConnectionState,
    /// Messages waiting for the link to open.
    /// 等待链路打开的消息数。
    pub queued: usize,
    pub observers: usize,
    /// Callers parked in `connect()`.
    /// 在 `connect()` 中等待的调用者数。
    pub waiters: usize,
    /// Incremented for every attempt and every reset. Events from older
    /// generations are discarded.
    ///
    /// 每次尝试和每次重置时递增。来自旧代的事件会被丢弃。
    pub generation: u64,
}
