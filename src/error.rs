//! Defines all possible error types in the library.
//! 定义了库中所有可能的错误类型。

use std::sync::Arc;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// The primary error type for the connection manager library.
/// 连接管理库的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying I/O error occurred.
    /// 发生了底层的I/O错误。
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The WebSocket transport reported an error.
    /// WebSocket 传输层报告了错误。
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// The endpoint address could not be parsed.
    /// 无法解析端点地址。
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A connection attempt failed. The cause is shared between every caller
    /// that waited on the same attempt.
    ///
    /// 连接尝试失败。失败原因在等待同一次尝试的所有调用者之间共享。
    #[error("Connection attempt failed: {0}")]
    ConnectFailed(Arc<Error>),

    /// The configured connect timeout elapsed before the link opened.
    /// 在链路打开之前，配置的连接超时已到期。
    #[error("Connection attempt timed out")]
    ConnectTimeout,

    /// The link was lost while queued messages were being flushed.
    /// 在刷新排队消息时链路丢失。
    #[error("Connection closed")]
    ConnectionClosed,

    /// The manager was closed while the caller was waiting for a connection.
    /// 调用者等待连接时管理器被关闭。
    #[error("Connection attempt aborted by close")]
    Aborted,

    /// An internal channel for communication between tasks was closed unexpectedly.
    /// 用于任务间通信的内部通道意外关闭。
    #[error("Internal channel is broken")]
    ChannelClosed,
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) => e,
            Error::WebSocket(e) => std::io::Error::other(e),
            Error::InvalidEndpoint(e) => std::io::Error::new(ErrorKind::InvalidInput, e),
            Error::ConnectFailed(e) => std::io::Error::new(ErrorKind::ConnectionRefused, e.to_string()),
            Error::ConnectTimeout => ErrorKind::TimedOut.into(),
            Error::ConnectionClosed => ErrorKind::ConnectionReset.into(),
            Error::Aborted => ErrorKind::ConnectionAborted.into(),
            Error::ChannelClosed => ErrorKind::BrokenPipe.into(),
        }
    }
}
