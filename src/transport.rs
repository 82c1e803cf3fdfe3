//! Transport layer abstraction for the managed connection.
//!
//! The manager never touches a socket directly. It opens links through a
//! [`Transport`], writes through the [`LinkWriter`] half and consumes
//! [`LinkEvent`]s from the [`LinkReader`] half.
//!
//! 受管连接的传输层抽象。
//!
//! 管理器从不直接操作套接字。它通过 [`Transport`] 打开链路，
//! 通过 [`LinkWriter`] 写入，并从 [`LinkReader`] 读取 [`LinkEvent`]。

pub mod reader;
pub mod ws;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;

pub use reader::link_reader_task;
pub use ws::WsTransport;

/// The status code of a normal, clean closure.
/// 正常关闭的状态码。
pub const CLOSE_NORMAL: u16 = 1000;

/// The status code reported when a link ends without a close frame.
/// 链路在没有关闭帧的情况下结束时报告的状态码。
pub const CLOSE_ABNORMAL: u16 = 1006;

/// An opaque message travelling over the link.
///
/// 在链路上传输的不透明消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Bytes),
}

impl Payload {
    /// Length of the payload in bytes.
    /// 载荷的字节长度。
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the text content, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(data))
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Payload::Binary(data)
    }
}

/// The status reported when a link closes.
///
/// 链路关闭时报告的状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// A closure without a close frame, e.g. a dropped TCP stream.
    /// 没有关闭帧的关闭，例如TCP流断开。
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(CLOSE_ABNORMAL, reason)
    }

    /// Whether the peer shut the link down cleanly.
    /// 对端是否干净地关闭了链路。
    pub fn is_normal(&self) -> bool {
        self.code == CLOSE_NORMAL
    }
}

/// An event produced by the read half of a link.
///
/// 链路读取端产生的事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// An inbound message.
    /// 一条入站消息。
    Message(Payload),
    /// The link has closed. No further events follow.
    /// 链路已关闭。之后不会再有事件。
    Closed(CloseInfo),
}

/// The write half of an open link.
///
/// 已打开链路的写入端。
#[async_trait]
pub trait LinkWriter: Send + 'static {
    /// Transmits a single payload.
    /// 发送单个载荷。
    async fn send(&mut self, payload: Payload) -> Result<()>;

    /// Starts a normal closure of the link.
    /// 开始正常关闭链路。
    async fn close(&mut self) -> Result<()>;
}

/// The read half of an open link.
///
/// 已打开链路的读取端。
#[async_trait]
pub trait LinkReader: Send + 'static {
    /// Waits for the next inbound event.
    ///
    /// Once [`LinkEvent::Closed`] has been returned the reader is finished and
    /// must not be polled again.
    ///
    /// 等待下一个入站事件。
    ///
    /// 一旦返回了 [`LinkEvent::Closed`]，读取端即结束，不得再次调用。
    async fn next_event(&mut self) -> LinkEvent;
}

/// Transport layer interface used to open links to an endpoint.
///
/// This trait abstracts the underlying socket implementation, enabling
/// scripted transports for testing.
///
/// 用于打开到端点链路的传输层接口。
///
/// 此trait抽象了底层套接字实现，使测试可以使用脚本化的传输。
#[async_trait]
pub trait Transport: Send + Sync + Debug + 'static {
    type Writer: LinkWriter;
    type Reader: LinkReader;

    /// Opens a new link to `url`, resolving once the link is ready for use.
    ///
    /// 打开一条到 `url` 的新链路，在链路可用时返回。
    async fn open(&self, url: &str) -> Result<(Self::Writer, Self::Reader)>;
}
