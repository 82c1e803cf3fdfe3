//! The actor that owns the link and every piece of connection state.
//!
//! All transitions happen on this one task. The public handle only sends
//! commands, and the tasks spawned here report back through
//! [`InternalEvent`]s, so no state is ever touched concurrently.
//!
//! 拥有链路和所有连接状态的actor。
//!
//! 所有状态转换都在这一个任务上发生。公共句柄只发送命令，此处派生的任务通过
//! [`InternalEvent`] 回报，因此状态永远不会被并发访问。

use super::{
    command::{InternalEvent, ManagerCommand, Observer},
    event::{ConnectTrigger, ConnectionEvent},
    state::{ConnectionState, ManagerSnapshot},
};
use crate::{
    config::Config,
    error::{Error, Result},
    transport::{CloseInfo, LinkEvent, LinkWriter, Payload, Transport, link_reader_task},
};
use std::{
    collections::VecDeque,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, trace, warn};

/// How long a replaced or released link gets to send its close frame.
/// 被替换或释放的链路发送关闭帧的时限。
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// A caller parked in `connect()`.
/// 在 `connect()` 中等待的调用者。
struct Waiter {
    response_tx: oneshot::Sender<Result<()>>,
    /// Registered while an attempt was already in flight.
    /// 在已有尝试进行中时注册。
    joined: bool,
    /// Already carried over to a retry once.
    /// 已经被转入过一次重试。
    retried: bool,
}

/// The manager's single-writer event loop.
///
/// 管理器的单写者事件循环。
pub(crate) struct ManagerActor<T: Transport> {
    transport: Arc<T>,
    config: Arc<Config>,
    state: ConnectionState,
    generation: u64,
    trigger: ConnectTrigger,
    writer: Option<T::Writer>,
    reader_task: Option<JoinHandle<()>>,
    attempt_task: Option<JoinHandle<()>>,
    queue: VecDeque<Payload>,
    observers: Vec<Observer>,
    waiters: Vec<Waiter>,
    command_rx: mpsc::UnboundedReceiver<ManagerCommand>,
    internal_tx: mpsc::UnboundedSender<InternalEvent<T>>,
    internal_rx: mpsc::UnboundedReceiver<InternalEvent<T>>,
    state_tx: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<ConnectionEvent>,
}

impl<T: Transport> ManagerActor<T> {
    pub(crate) fn new(
        transport: Arc<T>,
        config: Arc<Config>,
        command_rx: mpsc::UnboundedReceiver<ManagerCommand>,
        state_tx: watch::Sender<ConnectionState>,
        event_tx: broadcast::Sender<ConnectionEvent>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            config,
            state: ConnectionState::Idle,
            generation: 0,
            trigger: ConnectTrigger::Caller,
            writer: None,
            reader_task: None,
            attempt_task: None,
            queue: VecDeque::new(),
            observers: Vec::new(),
            waiters: Vec::new(),
            command_rx,
            internal_tx,
            internal_rx,
            state_tx,
            event_tx,
        }
    }

    /// Runs the actor until every handle has been dropped.
    ///
    /// 运行actor，直到所有句柄都被丢弃。
    pub(crate) async fn run(&mut self) {
        loop {
            tokio::select! {
                biased;
                // 1. Results from attempt and reader tasks.
                // 1. 来自尝试任务和读取任务的结果。
                Some(event) = self.internal_rx.recv() => {
                    self.handle_internal_event(event).await;
                }
                // 2. Commands from the public handles.
                // 2. 来自公共句柄的命令。
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        debug!("All manager handles dropped, shutting down");
        self.reset().await;
    }

    async fn handle_command(&mut self, command: ManagerCommand) {
        trace!(?command, state = %self.state, "Handling manager command");
        match command {
            ManagerCommand::Connect { response_tx } => {
                if self.state == ConnectionState::Open {
                    let _ = response_tx.send(Ok(()));
                    return;
                }
                let joined = !self.state.can_start_attempt();
                self.waiters.push(Waiter {
                    response_tx,
                    joined,
                    retried: false,
                });
                if !joined {
                    self.start_attempt(ConnectTrigger::Caller).await;
                }
            }
            ManagerCommand::Send { payload } => self.handle_send(payload).await,
            ManagerCommand::Close { response_tx } => {
                self.reset().await;
                let _ = response_tx.send(());
            }
            ManagerCommand::AddObserver { observer } => {
                self.observers.push(observer);
            }
            ManagerCommand::Snapshot { response_tx } => {
                let _ = response_tx.send(self.snapshot());
            }
        }
    }

    async fn handle_send(&mut self, payload: Payload) {
        if !self.state.queues_outbound() {
            self.write_now(payload).await;
            return;
        }

        self.queue.push_back(payload);
        if self.state.can_start_attempt() {
            debug!(
                queued = self.queue.len(),
                "Not connected, queuing message and reconnecting in the background"
            );
            self.start_attempt(ConnectTrigger::Send).await;
        } else {
            debug!(queued = self.queue.len(), "Connection in progress, queuing message");
        }
    }

    async fn handle_internal_event(&mut self, event: InternalEvent<T>) {
        match event {
            InternalEvent::AttemptFinished { generation, result } => {
                if generation != self.generation || self.state != ConnectionState::Connecting {
                    debug!(generation, current = self.generation, "Discarding stale attempt result");
                    if let Ok((writer, _reader)) = result {
                        close_writer(writer, generation).await;
                    }
                    return;
                }
                self.attempt_task = None;
                match result {
                    Ok((writer, reader)) => self.on_open(writer, reader).await,
                    Err(e) => self.on_attempt_failed(e).await,
                }
            }
            InternalEvent::Link { generation, event } => {
                if generation != self.generation {
                    trace!(generation, current = self.generation, "Discarding event from replaced link");
                    return;
                }
                match event {
                    LinkEvent::Message(payload) => self.notify_observers(&payload),
                    LinkEvent::Closed(close) => self.on_link_closed(close).await,
                }
            }
        }
    }

    /// Moves to `Connecting` and spawns a fresh attempt, releasing any held link first.
    ///
    /// 进入 `Connecting` 并派生新的尝试，先释放任何持有的链路。
    async fn start_attempt(&mut self, trigger: ConnectTrigger) {
        // At most one link is held; the old one is closed before a new one opens.
        self.release_link().await;

        self.generation += 1;
        self.trigger = trigger;
        self.set_state(ConnectionState::Connecting);

        let generation = self.generation;
        let url = self.config.endpoint.url();
        info!(generation, url = %url, ?trigger, "Opening connection");
        self.emit(ConnectionEvent::Connecting { generation, trigger });

        self.attempt_task = Some(tokio::spawn(connect_attempt_task(
            self.transport.clone(),
            url,
            self.config.connection.connect_timeout,
            generation,
            self.internal_tx.clone(),
        )));
    }

    async fn on_open(&mut self, writer: T::Writer, reader: T::Reader) {
        let generation = self.generation;
        self.writer = Some(writer);
        self.reader_task = Some(tokio::spawn(link_reader_task::<T>(
            reader,
            generation,
            self.internal_tx.clone(),
        )));
        self.set_state(ConnectionState::Open);
        info!(generation, queued = self.queue.len(), "Connection opened");

        match self.flush_queue().await {
            Ok(flushed) => {
                debug!(generation, flushed, "Flushed queued messages");
                self.emit(ConnectionEvent::Opened { generation, flushed });
                for waiter in self.waiters.drain(..) {
                    let _ = waiter.response_tx.send(Ok(()));
                }
            }
            Err(e) => {
                self.on_write_failure(e).await;
                for waiter in self.waiters.drain(..) {
                    let _ = waiter.response_tx.send(Err(Error::ConnectionClosed));
                }
            }
        }
    }

    async fn on_attempt_failed(&mut self, error: Error) {
        let generation = self.generation;
        let trigger = self.trigger;
        self.set_state(ConnectionState::Closed);

        match trigger {
            ConnectTrigger::Send => warn!(
                generation,
                error = %error,
                queued = self.queue.len(),
                "Background reconnect failed"
            ),
            _ => warn!(
                generation,
                error = %error,
                queued = self.queue.len(),
                ?trigger,
                "Connection attempt failed"
            ),
        }
        self.emit(ConnectionEvent::ConnectFailed {
            generation,
            trigger,
            reason: error.to_string(),
        });

        let error = Arc::new(error);
        let (retrying, failed): (Vec<_>, Vec<_>) = self
            .waiters
            .drain(..)
            .partition(|waiter| waiter.joined && !waiter.retried);

        for waiter in failed {
            let _ = waiter.response_tx.send(Err(Error::ConnectFailed(error.clone())));
        }

        if !retrying.is_empty() {
            info!(generation, waiters = retrying.len(), "Retrying once for callers that joined the failed attempt");
            self.waiters = retrying
                .into_iter()
                .map(|waiter| Waiter {
                    retried: true,
                    ..waiter
                })
                .collect();
            self.start_attempt(ConnectTrigger::Retry).await;
        }
    }

    async fn on_link_closed(&mut self, close: CloseInfo) {
        if self.state != ConnectionState::Open {
            trace!(code = close.code, state = %self.state, "Ignoring close of a link that is already down");
            return;
        }
        let generation = self.generation;

        // The reader task has already finished.
        self.reader_task = None;
        self.release_link().await;
        self.set_state(ConnectionState::Closed);

        if close.is_normal() {
            info!(generation, code = close.code, reason = %close.reason, "Connection closed");
        } else {
            warn!(
                generation,
                code = close.code,
                reason = %close.reason,
                "Connection closed unexpectedly, a later send or connect will reconnect"
            );
        }
        self.emit(ConnectionEvent::Closed { generation, close });
    }

    /// Writes a payload over the open link, re-queuing it if the write fails.
    ///
    /// 通过已打开的链路写入载荷，写入失败时重新排队。
    async fn write_now(&mut self, payload: Payload) {
        let result = match self.writer.as_mut() {
            Some(writer) => writer.send(payload.clone()).await,
            None => Err(Error::ConnectionClosed),
        };
        if let Err(e) = result {
            self.queue.push_front(payload);
            self.on_write_failure(e).await;
        }
    }

    /// Drains the queue in FIFO order. On failure the failing payload stays at
    /// the front, ahead of everything queued after it.
    ///
    /// 按FIFO顺序排空队列。失败时，失败的载荷留在队首，排在其后所有消息之前。
    async fn flush_queue(&mut self) -> Result<usize> {
        let mut flushed = 0;
        while let Some(payload) = self.queue.pop_front() {
            let result = match self.writer.as_mut() {
                Some(writer) => writer.send(payload.clone()).await,
                None => Err(Error::ConnectionClosed),
            };
            if let Err(e) = result {
                self.queue.push_front(payload);
                return Err(e);
            }
            flushed += 1;
        }
        Ok(flushed)
    }

    async fn on_write_failure(&mut self, error: Error) {
        let generation = self.generation;
        warn!(
            generation,
            error = %error,
            queued = self.queue.len(),
            "Write failed, treating the link as lost"
        );
        self.release_link().await;
        self.set_state(ConnectionState::Closed);
        self.emit(ConnectionEvent::Closed {
            generation,
            close: CloseInfo::abnormal(error.to_string()),
        });
    }

    fn notify_observers(&self, payload: &Payload) {
        trace!(len = payload.len(), observers = self.observers.len(), "Dispatching inbound message");
        for (index, observer) in self.observers.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| observer(payload))).is_err() {
                error!(index, "Observer panicked while handling an inbound message");
            }
        }
    }

    /// Releases the link, the queue and every waiter, returning to `Idle`.
    ///
    /// 释放链路、队列和所有等待者，回到 `Idle`。
    async fn reset(&mut self) {
        if let Some(task) = self.attempt_task.take() {
            task.abort();
        }
        self.release_link().await;

        let discarded = self.queue.len();
        self.queue.clear();
        self.generation += 1;
        for waiter in self.waiters.drain(..) {
            let _ = waiter.response_tx.send(Err(Error::Aborted));
        }
        self.set_state(ConnectionState::Idle);

        info!(discarded, "Connection manager reset");
        self.emit(ConnectionEvent::Reset { discarded });
    }

    /// Stops the reader and closes the held writer, if any.
    ///
    /// 停止读取任务并关闭持有的写入端（如果有）。
    async fn release_link(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(writer) = self.writer.take() {
            close_writer(writer, self.generation).await;
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            trace!(from = %self.state, to = %state, "State transition");
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    fn snapshot(&self) -> ManagerSnapshot {
        ManagerSnapshot {
            state: self.state,
            queued: self.queue.len(),
            observers: self.observers.len(),
            waiters: self.waiters.len(),
            generation: self.generation,
        }
    }
}

/// Opens one link and reports the outcome to the actor.
///
/// 打开一条链路并将结果报告给actor。
async fn connect_attempt_task<T: Transport>(
    transport: Arc<T>,
    url: String,
    connect_timeout: Option<Duration>,
    generation: u64,
    tx: mpsc::UnboundedSender<InternalEvent<T>>,
) {
    let result = match connect_timeout {
        Some(limit) => match tokio::time::timeout(limit, transport.open(&url)).await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectTimeout),
        },
        None => transport.open(&url).await,
    };
    if tx.send(InternalEvent::AttemptFinished { generation, result }).is_err() {
        debug!(generation, "Manager is gone, dropping attempt result");
    }
}

async fn close_writer<W: LinkWriter>(mut writer: W, generation: u64) {
    match tokio::time::timeout(CLOSE_GRACE, writer.close()).await {
        Ok(Ok(())) => trace!(generation, "Closed link"),
        Ok(Err(e)) => debug!(generation, error = %e, "Failed to close link cleanly"),
        Err(_) => debug!(generation, "Timed out closing link"),
    }
}
