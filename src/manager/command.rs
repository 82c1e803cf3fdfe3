//! Messages exchanged with the manager actor.
//!
//! 与管理器actor交换的消息。

use super::state::ManagerSnapshot;
use crate::{
    error::Result,
    transport::{LinkEvent, Payload, Transport},
};
use std::{fmt, sync::Arc};
use tokio::sync::oneshot;

/// A callback invoked once per inbound message.
/// 每条入站消息调用一次的回调。
pub type Observer = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Commands sent from a [`ConnectionManager`](super::ConnectionManager) handle to the actor.
///
/// 从 [`ConnectionManager`](super::ConnectionManager) 句柄发送到actor的命令。
pub enum ManagerCommand {
    /// Resolve once the link is open, starting or joining an attempt as needed.
    /// 在链路打开时返回，必要时启动或加入一次尝试。
    Connect {
        response_tx: oneshot::Sender<Result<()>>,
    },
    /// Transmit or queue a payload.
    /// 发送或排队一个载荷。
    Send { payload: Payload },
    /// Release the link and discard the queue.
    /// 释放链路并丢弃队列。
    Close { response_tx: oneshot::Sender<()> },
    /// Register an inbound message observer.
    /// 注册一个入站消息观察者。
    AddObserver { observer: Observer },
    /// Report the actor's bookkeeping.
    /// 报告actor的内部状态。
    Snapshot {
        response_tx: oneshot::Sender<ManagerSnapshot>,
    },
}

impl fmt::Debug for ManagerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerCommand::Connect { .. } => f.write_str("Connect"),
            ManagerCommand::Send { payload } => f.debug_struct("Send").field("len", &payload.len()).finish(),
            ManagerCommand::Close { .. } => f.write_str("Close"),
            ManagerCommand::AddObserver { .. } => f.write_str("AddObserver"),
            ManagerCommand::Snapshot { .. } => f.write_str("Snapshot"),
        }
    }
}

/// Events reported to the actor by the tasks it spawns.
///
/// 由actor派生的任务报告给actor的事件。
pub enum InternalEvent<T: Transport> {
    /// A connection attempt finished.
    /// 一次连接尝试已结束。
    AttemptFinished {
        generation: u64,
        result: Result<(T::Writer, T::Reader)>,
    },
    /// The read half of a link produced an event.
    /// 链路读取端产生了一个事件。
    Link { generation: u64, event: LinkEvent },
}
