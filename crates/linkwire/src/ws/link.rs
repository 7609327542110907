//! Subscription transport over a shared WebSocket.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use reqwest::cookie::{CookieStore, Jar};
use tokio::runtime::Handle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use url::Url;

use super::connection::Connection;
use super::message::{ConnectionState, SubscriptionId};
use crate::config::parse_endpoint;
use crate::error::{ErrorHook, Result, RpcError};
use crate::link::{Link, Next, Outcome};
use crate::operation::Operation;
use crate::subscription::{PendingSubscription, SubscriptionHandlers, Unsubscribe};

/// Builder for a [`WsLink`].
pub struct WsLinkBuilder {
    url: String,
    on_error: ErrorHook,
    cookie_jar: Option<Arc<Jar>>,
    headers: Vec<(String, String)>,
}

impl WsLinkBuilder {
    /// Create a builder for the given socket URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            on_error: ErrorHook::default(),
            cookie_jar: None,
            headers: Vec::new(),
        }
    }

    /// Receive connection-level failures and frames that belong to no
    /// subscription.
    pub fn on_error(mut self, hook: ErrorHook) -> Self {
        self.on_error = hook;
        self
    }

    /// Send the jar's cookies for this host with the handshake.
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Add a header to the handshake request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Build the link. No socket is opened until the first subscription.
    pub fn build(self) -> Result<WsLink> {
        let url = parse_endpoint(&self.url, &["ws", "wss"])?;

        // Fail on bad headers here rather than on first connect.
        for (name, value) in &self.headers {
            header_pair(name, value)?;
        }

        Ok(WsLink {
            inner: Arc::new(WsLinkInner {
                url,
                headers: self.headers,
                cookie_jar: self.cookie_jar,
                on_error: self.on_error,
                issued: Arc::new(AtomicU64::new(1)),
                connection: Mutex::new(None),
            }),
        })
    }
}

struct WsLinkInner {
    url: Url,
    headers: Vec<(String, String)>,
    cookie_jar: Option<Arc<Jar>>,
    on_error: ErrorHook,
    /// Next subscription id. Shared with every connection so ids stay unique
    /// for the life of the link.
    issued: Arc<AtomicU64>,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl Drop for WsLinkInner {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.get_mut().take() {
            connection.dispose();
        }
    }
}

/// Carries subscriptions over one lazily opened WebSocket.
///
/// All subscriptions share a single connection. Subscribing while the
/// handshake is in flight is allowed; the subscribe message is queued and
/// sent once the socket opens. When the connection is lost every live
/// subscription receives [`RpcError::ConnectionClosed`] and the failure is
/// reported to the error hook. The next subscription opens a fresh socket.
///
/// This is a terminating link for subscriptions and refuses other
/// operations.
///
/// # Example
///
/// ```ignore
/// use linkwire::ws::WsLink;
/// use linkwire::{Operation, SubscriptionHandlers};
///
/// let link = WsLink::new("ws://localhost:4000/ws")?;
/// let handle = link.subscribe(
///     Operation::subscription(["pings"], None),
///     SubscriptionHandlers::new(|v| println!("{v}"), |e| eprintln!("{e}")),
/// );
/// ```
#[derive(Clone)]
pub struct WsLink {
    inner: Arc<WsLinkInner>,
}

impl WsLink {
    /// Create a link for the given URL with default settings.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        WsLinkBuilder::new(url).build()
    }

    /// Create a builder for the given URL.
    pub fn builder(url: impl Into<String>) -> WsLinkBuilder {
        WsLinkBuilder::new(url)
    }

    /// The socket URL.
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// State of the current connection, or `None` before the first
    /// subscription or after [`dispose`](Self::dispose).
    pub fn state(&self) -> Option<ConnectionState> {
        self.inner
            .connection
            .lock()
            .as_ref()
            .map(|connection| connection.state())
    }

    /// Number of subscriptions on the current connection.
    pub fn active_subscriptions(&self) -> usize {
        self.inner
            .connection
            .lock()
            .as_ref()
            .map_or(0, |connection| connection.active())
    }

    /// Start a subscription.
    ///
    /// Must be called from within a Tokio runtime when no connection is
    /// open yet. Setup failures are delivered to `handlers` and the returned
    /// handle is already cancelled.
    pub fn subscribe(&self, operation: Operation, handlers: SubscriptionHandlers) -> Unsubscribe {
        if !operation.is_subscription() {
            handlers.error(not_a_subscription(&operation));
            return Unsubscribe::inert();
        }

        let connection = match self.connection() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::warn!(target: "linkwire::ws", %error, key = %operation.key(), "cannot open connection");
                handlers.error(error);
                return Unsubscribe::inert();
            }
        };

        let id = SubscriptionId(self.inner.issued.fetch_add(1, Ordering::SeqCst));
        connection.subscribe(id, &operation, handlers)
    }

    /// Close the connection. Live subscriptions receive
    /// [`RpcError::ConnectionClosed`]; nothing is reported to the hook.
    pub fn dispose(&self) {
        let connection = self.inner.connection.lock().take();
        if let Some(connection) = connection {
            connection.dispose();
        }
    }

    /// The open or opening connection, creating one if needed.
    fn connection(&self) -> Result<Arc<Connection>> {
        let mut slot = self.inner.connection.lock();
        if let Some(connection) = slot.as_ref()
            && connection.state() != ConnectionState::Closed
        {
            return Ok(connection.clone());
        }

        let runtime = Handle::try_current()
            .map_err(|e| RpcError::Transport(format!("no async runtime: {e}")))?;
        let request = self.handshake_request()?;
        let connection = Connection::spawn(
            request,
            self.inner.issued.clone(),
            self.inner.on_error.clone(),
            &runtime,
        );
        *slot = Some(connection.clone());
        Ok(connection)
    }

    fn handshake_request(&self) -> Result<Request> {
        let inner = &self.inner;
        let mut request = inner
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| RpcError::InvalidUrl(format!("{}: {e}", inner.url)))?;

        let headers = request.headers_mut();
        for (name, value) in &inner.headers {
            let (name, value) = header_pair(name, value)?;
            headers.insert(name, value);
        }

        if let Some(jar) = &inner.cookie_jar
            && let Some(cookies) = jar.cookies(&cookie_url(&inner.url))
        {
            let value = HeaderValue::from_bytes(cookies.as_bytes())
                .map_err(|e| RpcError::InvalidHeader(format!("cookie: {e}")))?;
            headers.insert(COOKIE, value);
        }

        Ok(request)
    }
}

impl Link for WsLink {
    fn route(&self, operation: Operation, _next: Next<'_>) -> Outcome {
        if !operation.is_subscription() {
            return Outcome::Failed(not_a_subscription(&operation));
        }

        let link = self.clone();
        Outcome::Subscription(PendingSubscription::new(move |handlers| {
            link.subscribe(operation, handlers)
        }))
    }

    fn dispose(&self) {
        WsLink::dispose(self);
    }
}

impl std::fmt::Debug for WsLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsLink")
            .field("url", &self.inner.url.as_str())
            .field("state", &self.state())
            .finish()
    }
}

/// Cookies are stored against http(s) URLs; look them up under the
/// matching scheme.
fn cookie_url(url: &Url) -> Url {
    let mut lookup = url.clone();
    let scheme = if url.scheme() == "wss" { "https" } else { "http" };
    // ws -> http and wss -> https are both permitted by `set_scheme`.
    let _ = lookup.set_scheme(scheme);
    lookup
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| RpcError::InvalidHeader(format!("{name}: {e}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| RpcError::InvalidHeader(format!("{name}: {e}")))?;
    Ok((header_name, header_value))
}

fn not_a_subscription(operation: &Operation) -> RpcError {
    RpcError::Unroutable(format!(
        "{} `{}` cannot be carried over the streaming link",
        operation.kind(),
        operation.key()
    ))
}
