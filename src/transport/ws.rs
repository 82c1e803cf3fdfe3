//! WebSocket implementation of the transport traits on top of `tokio-tungstenite`.
//!
//! 基于 `tokio-tungstenite` 的传输trait WebSocket实现。

use super::{CloseInfo, LinkEvent, LinkReader, LinkWriter, Payload, Transport};
use crate::error::Result;
use async_trait::async_trait;
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        self, Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::{debug, trace};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Status code used when the peer closes without a status.
/// 对端关闭但未提供状态时使用的状态码。
const CLOSE_NO_STATUS: u16 = 1005;

/// A transport that opens WebSocket links with `tokio-tungstenite`.
///
/// 使用 `tokio-tungstenite` 打开WebSocket链路的传输。
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    type Writer = WsWriter;
    type Reader = WsReader;

    async fn open(&self, url: &str) -> Result<(WsWriter, WsReader)> {
        let (stream, response) = connect_async(url).await?;
        debug!(url, status = %response.status(), "WebSocket handshake completed");

        let (sink, stream) = stream.split();
        Ok((WsWriter { sink }, WsReader { stream }))
    }
}

/// Write half of a WebSocket link.
/// WebSocket链路的写入端。
pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl LinkWriter for WsWriter {
    async fn send(&mut self, payload: Payload) -> Result<()> {
        let message = match payload {
            Payload::Text(text) => Message::text(text),
            Payload::Binary(data) => Message::binary(data),
        };
        self.sink.send(message).await.map_err(Into::into)
    }

    async fn close(&mut self) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        match self.sink.send(Message::Close(Some(frame))).await {
            Ok(()) => Ok(()),
            // The peer got there first; the link is already down.
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read half of a WebSocket link.
/// WebSocket链路的读取端。
pub struct WsReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl LinkReader for WsReader {
    async fn next_event(&mut self) -> LinkEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return LinkEvent::Message(Payload::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return LinkEvent::Message(Payload::Binary(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    let info = match frame {
                        Some(frame) => CloseInfo::new(u16::from(frame.code), frame.reason.as_str()),
                        None => CloseInfo::new(CLOSE_NO_STATUS, ""),
                    };
                    return LinkEvent::Closed(info);
                }
                // Control frames are answered by tungstenite itself.
                Some(Ok(other)) => {
                    trace!(kind = message_kind(&other), "Ignoring control frame");
                }
                Some(Err(e)) => return LinkEvent::Closed(CloseInfo::abnormal(e.to_string())),
                None => return LinkEvent::Closed(CloseInfo::abnormal("stream ended without close frame")),
            }
        }
    }
}

fn message_kind(message: &Message) -> &'static str {
    match message {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
        Message::Frame(_) => "frame",
    }
}
