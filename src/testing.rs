//! Test utilities module
//! 测试辅助工具模块

#![cfg(test)]

use crate::{
    config::Config,
    error::{Error, Result},
    manager::{ConnectionEvent, ConnectionManager, ManagerSnapshot},
    transport::{CloseInfo, LinkEvent, LinkReader, LinkWriter, Payload, Transport},
};
use async_trait::async_trait;
use std::sync::{
    Arc, Mutex, Once,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{self, Duration},
};

/// Generous upper bound for anything a test waits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Helper to initialize tracing for tests.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "kestrel_link=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// An open attempt the test has not answered yet.
pub struct PendingOpen {
    pub url: String,
    reply: oneshot::Sender<Result<(MockWriter, MockReader)>>,
}

impl PendingOpen {
    /// Lets the attempt succeed and returns the far side of the new link.
    pub fn accept(self) -> MockPeer {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let peer = MockPeer {
            event_tx,
            written: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::new(AtomicBool::new(false)),
        };
        let writer = MockWriter {
            written: peer.written.clone(),
            closed: peer.closed.clone(),
            fail_writes: peer.fail_writes.clone(),
        };
        let reader = MockReader { event_rx };
        let _ = self.reply.send(Ok((writer, reader)));
        peer
    }

    /// Fails the attempt as a refused connection would.
    pub fn reject(self, reason: &str) {
        let error = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, reason.to_string());
        let _ = self.reply.send(Err(Error::Io(error)));
    }
}

/// The remote side of an accepted mock link.
pub struct MockPeer {
    event_tx: mpsc::UnboundedSender<LinkEvent>,
    written: Arc<Mutex<Vec<Payload>>>,
    closed: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MockPeer {
    /// Delivers an inbound message to the manager.
    pub fn push(&self, payload: impl Into<Payload>) {
        let _ = self.event_tx.send(LinkEvent::Message(payload.into()));
    }

    /// Closes the link from the remote side.
    pub fn close_with(&self, code: u16, reason: &str) {
        let _ = self.event_tx.send(LinkEvent::Closed(CloseInfo::new(code, reason)));
    }

    /// Every payload the manager wrote, in order.
    pub fn written(&self) -> Vec<Payload> {
        self.written.lock().unwrap().clone()
    }

    /// Whether the manager closed its writer.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Makes every later write fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

pub struct MockWriter {
    written: Arc<Mutex<Vec<Payload>>>,
    closed: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

#[async_trait]
impl LinkWriter for MockWriter {
    async fn send(&mut self, payload: Payload) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) || self.closed.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::ErrorKind::BrokenPipe.into()));
        }
        self.written.lock().unwrap().push(payload);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockReader {
    event_rx: mpsc::UnboundedReceiver<LinkEvent>,
}

#[async_trait]
impl LinkReader for MockReader {
    async fn next_event(&mut self) -> LinkEvent {
        self.event_rx
            .recv()
            .await
            .unwrap_or_else(|| LinkEvent::Closed(CloseInfo::abnormal("mock peer dropped")))
    }
}

/// A transport whose open attempts are answered by the test.
#[derive(Debug, Clone)]
pub struct MockTransport {
    open_tx: mpsc::UnboundedSender<PendingOpen>,
    opens: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for MockTransport {
    type Writer = MockWriter;
    type Reader = MockReader;

    async fn open(&self, url: &str) -> Result<(MockWriter, MockReader)> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let (reply, reply_rx) = oneshot::channel();
        self.open_tx
            .send(PendingOpen {
                url: url.to_string(),
                reply,
            })
            .map_err(|_| Error::ChannelClosed)?;
        reply_rx.await.map_err(|_| Error::ChannelClosed)?
    }
}

/// A harness for testing a `ConnectionManager` against a `MockTransport`.
pub struct ManagerHarness {
    pub manager: ConnectionManager,
    pub events: broadcast::Receiver<ConnectionEvent>,
    open_rx: mpsc::UnboundedReceiver<PendingOpen>,
    opens: Arc<AtomicUsize>,
}

impl ManagerHarness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        init_tracing();
        let (open_tx, open_rx) = mpsc::unbounded_channel();
        let opens = Arc::new(AtomicUsize::new(0));
        let transport = MockTransport {
            open_tx,
            opens: opens.clone(),
        };
        let manager = ConnectionManager::with_transport(config, transport);
        let events = manager.subscribe_events();
        Self {
            manager,
            events,
            open_rx,
            opens,
        }
    }

    /// Waits for the manager to start the next open attempt.
    pub async fn next_open(&mut self) -> PendingOpen {
        time::timeout(TEST_TIMEOUT, self.open_rx.recv())
            .await
            .expect("timed out waiting for an open attempt")
            .expect("transport dropped")
    }

    /// Number of times the transport was asked to open a link.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Waits for the first event matching `predicate`, skipping others.
    pub async fn wait_for_event<F>(&mut self, predicate: F) -> ConnectionEvent
    where
        F: Fn(&ConnectionEvent) -> bool,
    {
        let events = &mut self.events;
        time::timeout(TEST_TIMEOUT, async move {
            loop {
                match events.recv().await {
                    Ok(event) if predicate(&event) => return event,
                    Ok(_) => continue,
                    Err(e) => panic!("event stream broke: {e}"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    /// Polls the actor until its snapshot satisfies `predicate`.
    pub async fn wait_for_snapshot<F>(&self, predicate: F) -> ManagerSnapshot
    where
        F: Fn(&ManagerSnapshot) -> bool,
    {
        let manager = &self.manager;
        time::timeout(TEST_TIMEOUT, async move {
            loop {
                let snapshot = manager.snapshot().await.unwrap();
                if predicate(&snapshot) {
                    return snapshot;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("timed out waiting for snapshot")
    }

    /// Drives `connect()` through a successful open and returns the peer.
    pub async fn open(&mut self) -> MockPeer {
        let manager = self.manager.clone();
        let connect = tokio::spawn(async move { manager.connect().await });
        let peer = self.next_open().await.accept();
        connect.await.unwrap().unwrap();
        peer
    }
}
