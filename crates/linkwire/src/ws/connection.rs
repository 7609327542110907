//! One streaming socket shared by many subscriptions.
//!
//! A [`Connection`] owns the subscription registry and a command queue.
//! A single task drives the socket: it connects, then loops over queued
//! commands and inbound frames, so writes never race and inbound messages
//! are dispatched in arrival order. Messages queued while connecting are
//! flushed in FIFO order once the handshake completes.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use super::message::{ClientMessage, ConnectionState, ServerMessage, SubscriptionId};
use crate::error::{ErrorHook, RpcError};
use crate::operation::Operation;
use crate::subscription::{SubscriptionHandlers, Unsubscribe};

/// Command sent to the connection task.
pub(crate) enum Command {
    Send(ClientMessage),
    Close,
}

/// Registry entry for one subscription.
///
/// The liveness flag is held across data delivery, so retiring from another
/// thread waits for an in-flight callback. Reentrant so a callback may cancel
/// its own subscription.
struct Entry {
    path: String,
    handlers: SubscriptionHandlers,
    live: ReentrantMutex<Cell<bool>>,
}

impl Entry {
    fn new(path: String, handlers: SubscriptionHandlers) -> Self {
        Self {
            path,
            handlers,
            live: ReentrantMutex::new(Cell::new(true)),
        }
    }

    /// Mark the entry dead. Returns `true` only for the first call.
    fn retire(&self) -> bool {
        self.live.lock().replace(false)
    }

    /// Deliver `payload` unless the entry has been retired.
    fn deliver(&self, payload: Value) {
        let live = self.live.lock();
        if live.get() {
            self.handlers.data(payload);
        }
    }
}

struct Shared {
    state: ConnectionState,
    entries: HashMap<SubscriptionId, Arc<Entry>>,
}

pub(crate) struct Connection {
    shared: Mutex<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    /// Next id the owning link will hand out; every id below it was issued.
    issued: Arc<AtomicU64>,
    on_error: ErrorHook,
}

impl Connection {
    pub(crate) fn new(
        issued: Arc<AtomicU64>,
        on_error: ErrorHook,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Command>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(Self {
            shared: Mutex::new(Shared {
                state: ConnectionState::Connecting,
                entries: HashMap::new(),
            }),
            commands,
            issued,
            on_error,
        });
        (connection, rx)
    }

    /// Create a connection and start its task on `runtime`.
    pub(crate) fn spawn(
        request: Request,
        issued: Arc<AtomicU64>,
        on_error: ErrorHook,
        runtime: &Handle,
    ) -> Arc<Self> {
        let (connection, rx) = Self::new(issued, on_error);
        runtime.spawn(connection.clone().run(request, rx));
        connection
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Number of live subscriptions.
    pub(crate) fn active(&self) -> usize {
        self.shared.lock().entries.len()
    }

    /// Register a subscription and queue its subscribe message.
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        id: SubscriptionId,
        operation: &Operation,
        handlers: SubscriptionHandlers,
    ) -> Unsubscribe {
        let path = operation.key();
        let entry = Arc::new(Entry::new(path.clone(), handlers));

        {
            let mut shared = self.shared.lock();
            let queued = shared.state != ConnectionState::Closed && {
                shared.entries.insert(id, entry.clone());
                let message = ClientMessage::Subscribe {
                    id,
                    path: path.clone(),
                    input: operation.input().cloned(),
                };
                self.commands.send(Command::Send(message)).is_ok()
            };

            if !queued {
                shared.entries.remove(&id);
                drop(shared);
                entry.retire();
                entry.handlers.error(RpcError::ConnectionClosed);
                return Unsubscribe::inert();
            }
        }

        tracing::debug!(target: "linkwire::ws", %id, %path, "subscription registered");

        let connection = Arc::downgrade(self);
        Unsubscribe::new(move || {
            if let Some(connection) = connection.upgrade() {
                connection.unsubscribe(id);
            }
        })
    }

    /// Retire a subscription and queue one unsubscribe notice.
    fn unsubscribe(&self, id: SubscriptionId) {
        let (entry, state) = {
            let mut shared = self.shared.lock();
            let Some(entry) = shared.entries.remove(&id) else {
                return;
            };
            (entry, shared.state)
        };
        // Outside the registry lock: retiring may wait on a running callback.
        if !entry.retire() {
            return;
        }

        if state != ConnectionState::Closed {
            let _ = self.commands.send(Command::Send(ClientMessage::Unsubscribe {
                id,
                path: entry.path.clone(),
            }));
        }
        tracing::debug!(target: "linkwire::ws", %id, path = %entry.path, "subscription cancelled");
    }

    /// Close the connection at the caller's request.
    pub(crate) fn dispose(&self) {
        self.close(None);
        let _ = self.commands.send(Command::Close);
    }

    async fn run(
        self: Arc<Self>,
        request: Request,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let uri = request.uri().to_string();
        tracing::debug!(target: "linkwire::ws", %uri, "connecting");

        let mut stream = match tokio_tungstenite::connect_async(request).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                self.close(Some(e.into()));
                return;
            }
        };

        let disposed = {
            let mut shared = self.shared.lock();
            let disposed = shared.state != ConnectionState::Connecting;
            if !disposed {
                shared.state = ConnectionState::Open;
            }
            disposed
        };
        if disposed {
            tracing::debug!(target: "linkwire::ws", %uri, "disposed during handshake");
            let _ = stream.close(None).await;
            return;
        }
        tracing::debug!(target: "linkwire::ws", %uri, "connection open");

        let (mut write, mut read) = stream.split();

        let failure = loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Send(message)) => match serde_json::to_string(&message) {
                        Ok(json) => {
                            if let Err(e) = write.send(Message::Text(json.into())).await {
                                break Some(RpcError::from(e));
                            }
                        }
                        Err(e) => self.on_error.report(&RpcError::Encode(e.to_string())),
                    },
                    Some(Command::Close) | None => {
                        let _ = write.send(Message::Close(None)).await;
                        break None;
                    }
                },

                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
                    Some(Ok(Message::Binary(_))) => {
                        self.report_frame(RpcError::Decode("unexpected binary frame".into()));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break Some(RpcError::Transport("connection closed by server".into()));
                    }
                    // Pings are answered by tungstenite.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(RpcError::from(e)),
                },
            }
        };

        self.close(failure);
    }

    /// Route one inbound text frame.
    pub(crate) fn dispatch(&self, text: &str) {
        let message = match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                self.report_frame(RpcError::Decode(format!("malformed frame: {e}")));
                return;
            }
        };

        match message {
            ServerMessage::Data { id, payload } => {
                let entry = self.shared.lock().entries.get(&id).cloned();
                match entry {
                    Some(entry) => entry.deliver(payload),
                    None => self.unmatched(id),
                }
            }
            ServerMessage::Error { id, error } => match self.take(id) {
                Some(entry) => {
                    if entry.retire() {
                        tracing::debug!(target: "linkwire::ws", %id, %error, "subscription failed");
                        entry.handlers.error(RpcError::Remote(error));
                    }
                }
                None => self.unmatched(id),
            },
            ServerMessage::Complete { id } => match self.take(id) {
                Some(entry) => {
                    entry.retire();
                    tracing::debug!(target: "linkwire::ws", %id, path = %entry.path, "subscription completed");
                }
                None => self.unmatched(id),
            },
        }
    }

    fn take(&self, id: SubscriptionId) -> Option<Arc<Entry>> {
        self.shared.lock().entries.remove(&id)
    }

    fn unmatched(&self, id: SubscriptionId) {
        // Ids are issued from 1 upwards.
        if (1..self.issued.load(Ordering::SeqCst)).contains(&id.0) {
            // Late message for a subscription that already ended.
            tracing::trace!(target: "linkwire::ws", %id, "discarding message for retired subscription");
        } else {
            self.report_frame(RpcError::Decode(format!(
                "message for unknown subscription {id}"
            )));
        }
    }

    fn report_frame(&self, error: RpcError) {
        tracing::warn!(target: "linkwire::ws", %error, "dropping inbound frame");
        self.on_error.report(&error);
    }

    /// Move to `Closed` and fail every live subscription.
    ///
    /// `failure` is reported to the error hook; `None` means a requested close.
    pub(crate) fn close(&self, failure: Option<RpcError>) {
        let entries: Vec<Arc<Entry>> = {
            let mut shared = self.shared.lock();
            if shared.state == ConnectionState::Closed {
                return;
            }
            shared.state = ConnectionState::Closed;
            shared.entries.drain().map(|(_, entry)| entry).collect()
        };

        match &failure {
            Some(error) => {
                tracing::warn!(target: "linkwire::ws", %error, live = entries.len(), "connection lost");
            }
            None => {
                tracing::debug!(target: "linkwire::ws", live = entries.len(), "connection closed");
            }
        }

        for entry in entries {
            if entry.retire() {
                entry.handlers.error(RpcError::ConnectionClosed);
            }
        }

        if let Some(error) = failure {
            self.on_error.report(&error);
        }
    }
}
