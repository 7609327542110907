//! RPC client that routes each operation to the right transport.
//!
//! `linkwire` talks to a remote procedure service over two channels:
//!
//! - **HTTP** for queries and mutations, one request per call
//! - **WebSocket** for subscriptions, all multiplexed over one lazily opened
//!   socket
//!
//! Every operation passes through a [`LinkChain`]. The default chain built by
//! [`Client::new`] is a [`RoutingLink`] that sends subscriptions to a
//! [`WsLink`](ws::WsLink) and everything else on to an
//! [`HttpLink`](http::HttpLink).
//!
//! # Quick start
//!
//! ```ignore
//! use linkwire::{ClientConfig, SubscriptionHandlers};
//!
//! let client = linkwire::init(ClientConfig::from_env()?)?;
//!
//! let version: String = client.query(["version"]).await?;
//!
//! let pings = client.add_subscription(
//!     ["pings"],
//!     SubscriptionHandlers::new(
//!         |value| tracing::info!(%value, "ping"),
//!         |error| tracing::warn!(%error, "pings ended"),
//!     ),
//! );
//! ```
//!
//! # Errors
//!
//! Query and mutation failures are returned to the caller. Subscription
//! failures reach that subscription's error callback. Failures nobody owns
//! (a dropped socket, a malformed frame) go to the client's [`ErrorHook`],
//! which logs them by default.
//!
//! # Configuration
//!
//! See [`ClientConfig`] for the recognized options and environment
//! variables.

mod client;
mod config;
mod error;
mod global;
mod operation;
mod subscription;

pub mod http;
pub mod link;
pub mod ws;

pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, DEFAULT_HTTP_ENDPOINT, DEFAULT_WS_ENDPOINT};
pub use error::{ErrorHook, RemoteError, Result, RpcError};
pub use global::{client, init, install};
pub use link::{Link, LinkChain, LoggingLink, Next, Outcome, ResponseFuture, RoutingLink};
pub use operation::{Operation, OperationKind};
pub use subscription::{PendingSubscription, SubscriptionHandlers, Unsubscribe};
