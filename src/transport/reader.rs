//! Reader task that forwards inbound link events to the manager actor.
//!
//! 将入站链路事件转发给管理器actor的读取任务。

use super::{LinkEvent, LinkReader, Transport};
use crate::manager::command::InternalEvent;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// The dedicated task draining the read half of one link.
///
/// Every event is tagged with the `generation` of the attempt that opened the
/// link, so the actor can drop events from a link it has already replaced.
/// The task ends after forwarding the close event, or as soon as the actor
/// stops listening.
///
/// 读取单条链路读取端的专用任务。
///
/// 每个事件都带有打开该链路的尝试的 `generation`，以便actor丢弃已被替换链路的事件。
/// 任务在转发关闭事件后结束，或在actor停止监听时立即结束。
pub async fn link_reader_task<T: Transport>(
    mut reader: T::Reader,
    generation: u64,
    tx: mpsc::UnboundedSender<InternalEvent<T>>,
) {
    loop {
        let event = reader.next_event().await;
        let closed = matches!(event, LinkEvent::Closed(_));
        trace!(generation, closed, "link_reader_task forwarding event");

        if tx.send(InternalEvent::Link { generation, event }).is_err() {
            debug!(generation, "Manager is gone, stopping link reader");
            return;
        }
        if closed {
            return;
        }
    }
}
