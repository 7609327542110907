//! In-process WebSocket server and collectors for streaming tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use linkwire::{RpcError, SubscriptionHandlers};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// What the server should do next on the open connection.
pub enum Outbound {
    Text(String),
    /// Send a close frame, then stop.
    Close,
    /// Drop the socket without a close frame.
    Drop,
}

/// A WebSocket server that records inbound JSON and sends what it is told.
pub struct TestServer {
    port: u16,
    inbound: mpsc::UnboundedReceiver<Value>,
    outbound: mpsc::UnboundedSender<Outbound>,
    connections: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_delay(Duration::ZERO).await
    }

    /// Start a server that waits `delay` before completing each handshake.
    pub async fn start_with_delay(delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let outbound_rx = Arc::new(tokio::sync::Mutex::new(outbound_rx));
        let connections = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        let close_counter = closes.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(
                    stream,
                    delay,
                    inbound_tx.clone(),
                    outbound_rx.clone(),
                    close_counter.clone(),
                ));
            }
        });

        Self {
            port,
            inbound,
            outbound,
            connections,
            closes,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    pub fn http_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Close frames received from the client.
    pub fn closes_received(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn send(&self, message: Value) {
        let _ = self.outbound.send(Outbound::Text(message.to_string()));
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.outbound.send(Outbound::Text(text.to_string()));
    }

    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }

    pub fn drop_connection(&self) {
        let _ = self.outbound.send(Outbound::Drop);
    }

    /// Next JSON message the client sent.
    pub async fn recv(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.inbound.recv())
            .await
            .expect("timed out waiting for a client message")
            .expect("server stopped")
    }

    /// Assert that the client sends nothing for a short while.
    pub async fn assert_quiet(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(200), self.inbound.recv()).await;
        assert!(next.is_err(), "unexpected client message: {next:?}");
    }
}

async fn serve(
    stream: TcpStream,
    delay: Duration,
    inbound: mpsc::UnboundedSender<Value>,
    outbound: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Outbound>>>,
    closes: Arc<AtomicUsize>,
) {
    tokio::time::sleep(delay).await;
    let Ok(socket) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = socket.split();
    // One connection at a time receives instructions.
    let mut outbound = outbound.lock().await;

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(value) = serde_json::from_str(text.as_str()) {
                        let _ = inbound.send(value);
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    closes.fetch_add(1, Ordering::SeqCst);
                    break;
                }
                Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if write.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close) => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                Some(Outbound::Drop) | None => break,
            },
        }
    }
}

/// Something a subscription received.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Data(Value),
    Error(RpcError),
}

/// Handlers that record every callback.
#[derive(Clone, Default)]
pub struct Collector {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handlers(&self) -> SubscriptionHandlers {
        let (data, error) = (self.events.clone(), self.events.clone());
        SubscriptionHandlers::new(
            move |value| data.lock().push(Event::Data(value)),
            move |e| error.lock().push(Event::Error(e)),
        )
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Wait until at least `count` events have arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<Event> {
        eventually(|| self.events.lock().len() >= count).await;
        self.events()
    }
}

/// Errors passed to a client's error hook.
#[derive(Clone, Default)]
pub struct Reported {
    errors: Arc<Mutex<Vec<RpcError>>>,
}

impl Reported {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hook(&self) -> impl Fn(&RpcError) + Send + Sync + 'static {
        let errors = self.errors.clone();
        move |e| errors.lock().push(e.clone())
    }

    pub fn errors(&self) -> Vec<RpcError> {
        self.errors.lock().clone()
    }

    pub async fn wait_for(&self, count: usize) -> Vec<RpcError> {
        eventually(|| self.errors.lock().len() >= count).await;
        self.errors()
    }
}

/// Poll `condition` until it holds, failing after five seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within 5s");
}
