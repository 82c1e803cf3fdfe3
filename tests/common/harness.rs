//! Shared harness for the integration tests: a localhost WebSocket echo server.
//! 集成测试的共享工具：本地 WebSocket 回显服务器。

use futures::{SinkExt, StreamExt};
use kestrel_link::config::{Endpoint, Scheme};
use std::{net::SocketAddr, sync::Once, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::JoinHandle,
};
use tokio_tungstenite::{
    accept_async,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

/// Generous upper bound for anything a test waits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "kestrel_link=debug,lifecycle=info".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// A localhost WebSocket server that echoes text as `echo:<text>` and binary
/// frames unchanged. A text message `close:<code>` makes it close the link
/// with that status code.
pub struct EchoServer {
    pub addr: SocketAddr,
    /// Every text message the server received, across all connections.
    pub received: mpsc::UnboundedReceiver<String>,
    accept_task: JoinHandle<()>,
}

impl EchoServer {
    pub async fn start() -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();

        let accept_task = tokio::spawn(async move {
            while let Ok((stream, remote_addr)) = listener.accept().await {
                tracing::info!(%remote_addr, "[Server] accepted connection");
                tokio::spawn(echo_handler(stream, received_tx.clone()));
            }
        });

        Self {
            addr,
            received,
            accept_task,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(Scheme::Ws, "127.0.0.1", self.addr.port(), "/echo")
    }

    /// Waits for the next text message the server received.
    pub async fn next_received(&mut self) -> String {
        tokio::time::timeout(TEST_TIMEOUT, self.received.recv())
            .await
            .expect("timed out waiting for the server")
            .expect("server stopped")
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn echo_handler(stream: TcpStream, received_tx: mpsc::UnboundedSender<String>) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        match message {
            Message::Text(text) => {
                let text = text.as_str().to_owned();
                let _ = received_tx.send(text.clone());

                if let Some(code) = text.strip_prefix("close:") {
                    let code: u16 = code.parse().unwrap();
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: "requested".into(),
                    };
                    let _ = ws.close(Some(frame)).await;
                    // Drain until the client acknowledges the close.
                    while let Some(Ok(_)) = ws.next().await {}
                    return;
                }

                if ws.send(Message::text(format!("echo:{text}"))).await.is_err() {
                    return;
                }
            }
            Message::Binary(data) => {
                if ws.send(Message::binary(data)).await.is_err() {
                    return;
                }
            }
            Message::Close(_) => return,
            _ => {}
        }
    }
}

/// Returns a local address nobody is listening on.
pub async fn unused_endpoint() -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Endpoint::new(Scheme::Ws, "127.0.0.1", port, "/echo")
}
