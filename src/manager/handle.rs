//! The application-facing handle.
//!
//! 面向应用程序的句柄。

use super::{
    actor::ManagerActor,
    command::{ManagerCommand, Observer},
    event::ConnectionEvent,
    state::{ConnectionState, ManagerSnapshot},
};
use crate::{
    config::{Config, Endpoint},
    error::{Error, Result},
    transport::{Payload, Transport, WsTransport},
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{error, info};

/// A handle to a persistent connection to one endpoint.
///
/// Every clone talks to the same background actor, which owns the link, the
/// outbound queue and the observers. The actor stops and closes the link once
/// the last handle is dropped. Must be created inside a tokio runtime.
///
/// 指向一个端点的持久连接的句柄。
///
/// 所有克隆都与同一个后台actor通信，该actor拥有链路、出站队列和观察者。
/// 最后一个句柄被丢弃后，actor停止并关闭链路。必须在tokio运行时内创建。
#[derive(Clone)]
pub struct ConnectionManager {
    command_tx: mpsc::UnboundedSender<ManagerCommand>,
    state_rx: watch::Receiver<ConnectionState>,
    event_tx: broadcast::Sender<ConnectionEvent>,
    config: Arc<Config>,
}

impl ConnectionManager {
    /// Creates a manager that connects over WebSocket.
    ///
    /// 创建一个通过WebSocket连接的管理器。
    pub fn new(config: Config) -> Self {
        Self::with_transport(config, WsTransport)
    }

    /// Creates a manager that opens links through the given transport.
    ///
    /// 创建一个通过给定传输打开链路的管理器。
    pub fn with_transport<T: Transport>(config: Config, transport: T) -> Self {
        let config = Arc::new(config);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (event_tx, _) = broadcast::channel(config.connection.event_capacity.max(1));

        let mut actor = ManagerActor::new(
            Arc::new(transport),
            config.clone(),
            command_rx,
            state_tx,
            event_tx.clone(),
        );

        info!(endpoint = %config.endpoint, "ConnectionManager actor created and running");

        tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            command_tx,
            state_rx,
            event_tx,
            config,
        }
    }

    /// Resolves once the connection is open.
    ///
    /// Returns immediately when already open. While an attempt is in flight
    /// the caller joins it instead of starting another one; if that attempt
    /// fails, joined callers get exactly one retry.
    ///
    /// 在连接打开时返回。
    ///
    /// 已打开时立即返回。尝试进行中时，调用者会加入该尝试而不是启动新的尝试；
    /// 如果该尝试失败，加入的调用者会获得恰好一次重试。
    pub async fn connect(&self) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(ManagerCommand::Connect { response_tx })
            .map_err(|_| Error::ChannelClosed)?;
        response_rx.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Transmits `payload` now if the connection is open, otherwise queues it.
    ///
    /// Never fails and never waits. Sending while disconnected also starts a
    /// background reconnect, whose failure is only logged and published as a
    /// [`ConnectionEvent::ConnectFailed`].
    ///
    /// 如果连接已打开则立即发送 `payload`，否则将其排队。
    ///
    /// 从不失败也从不等待。断开时发送还会启动后台重连，其失败只会被记录日志并以
    /// [`ConnectionEvent::ConnectFailed`] 发布。
    pub fn send(&self, payload: impl Into<Payload>) {
        let payload = payload.into();
        if self.command_tx.send(ManagerCommand::Send { payload }).is_err() {
            error!("Connection manager actor is gone, dropping message");
        }
    }

    /// Releases the link and discards every queued message.
    ///
    /// Callers waiting in [`connect`](Self::connect) resolve with
    /// [`Error::Aborted`]. Safe to call repeatedly.
    ///
    /// 释放链路并丢弃所有排队消息。
    ///
    /// 在 [`connect`](Self::connect) 中等待的调用者会以 [`Error::Aborted`] 返回。可以重复调用。
    pub async fn close(&self) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(ManagerCommand::Close { response_tx })
            .map_err(|_| Error::ChannelClosed)?;
        response_rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// Registers a callback invoked for every inbound message, after all
    /// previously registered callbacks. Registrations survive reconnects.
    ///
    /// 注册一个在每条入站消息时调用的回调，在所有先前注册的回调之后调用。注册在重连后仍然有效。
    pub fn add_observer<F>(&self, observer: F)
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        if self.command_tx.send(ManagerCommand::AddObserver { observer }).is_err() {
            error!("Connection manager actor is gone, dropping observer");
        }
    }

    /// The current lifecycle state.
    /// 当前的生命周期状态。
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// A receiver that resolves on every state change.
    /// 在每次状态变化时触发的接收端。
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Subscribes to lifecycle events emitted from now on.
    /// 订阅从现在开始发出的生命周期事件。
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.event_tx.subscribe()
    }

    /// Reports the actor's bookkeeping after every previously issued command
    /// has been handled.
    ///
    /// 在所有先前发出的命令处理完毕后报告actor的内部状态。
    pub async fn snapshot(&self) -> Result<ManagerSnapshot> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(ManagerCommand::Snapshot { response_tx })
            .map_err(|_| Error::ChannelClosed)?;
        response_rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// The endpoint this manager connects to.
    /// 此管理器连接的端点。
    pub fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }
}
