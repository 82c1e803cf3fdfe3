//! Lifecycle events published by the manager.
//!
//! 管理器发布的生命周期事件。

use crate::transport::CloseInfo;

/// What started a connection attempt.
/// 连接尝试的触发来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectTrigger {
    /// An explicit `connect()` call.
    /// 显式的 `connect()` 调用。
    Caller,
    /// The background reconnect started by `send()` while disconnected.
    /// 断开时由 `send()` 启动的后台重连。
    Send,
    /// The single retry granted to callers that joined a failed attempt.
    /// 授予加入失败尝试的调用者的单次重试。
    Retry,
}

/// An observable change in the connection lifecycle.
///
/// Failures with no waiting caller, such as a background reconnect started by
/// `send()`, are only visible through these events and the log.
///
/// 连接生命周期中可观察的变化。
///
/// 没有等待调用者的失败（例如由 `send()` 启动的后台重连）只能通过这些事件和日志观察到。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A new attempt has started.
    /// 新的尝试已开始。
    Connecting {
        generation: u64,
        trigger: ConnectTrigger,
    },
    /// The link opened and `flushed` queued messages were written.
    /// 链路已打开，并写入了 `flushed` 条排队消息。
    Opened { generation: u64, flushed: usize },
    /// The attempt failed. Queued messages are kept.
    /// 尝试失败。排队的消息被保留。
    ConnectFailed {
        generation: u64,
        trigger: ConnectTrigger,
        reason: String,
    },
    /// An open link was closed by the peer or lost.
    /// 已打开的链路被对端关闭或丢失。
    Closed { generation: u64, close: CloseInfo },
    /// `close()` released the link and discarded the queue.
    /// `close()` 释放了链路并丢弃了队列。
    Reset { discarded: usize },
}
