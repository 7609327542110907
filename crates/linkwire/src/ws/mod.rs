//! Subscriptions over a shared WebSocket.
//!
//! [`WsLink`] opens one socket on first use and multiplexes every
//! subscription over it. Messages are JSON text frames tagged by `type`:
//!
//! ```text
//! client -> server   {"type":"subscribe","id":1,"path":"pings","input":null}
//!                    {"type":"unsubscribe","id":1,"path":"pings"}
//! server -> client   {"type":"data","id":1,"payload":...}
//!                    {"type":"error","id":1,"error":{"code":500,"message":"..."}}
//!                    {"type":"complete","id":1}
//! ```
//!
//! The connection moves from [`ConnectionState::Connecting`] to
//! [`ConnectionState::Open`] and finally to [`ConnectionState::Closed`]. It
//! is never reopened; a later subscription starts a new connection.

mod connection;
mod link;
mod message;

pub use link::{WsLink, WsLinkBuilder};
pub use message::{ClientMessage, ConnectionState, ServerMessage, SubscriptionId};
