//! Streaming wire messages and connection state.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteError;

/// Identifies one subscription on a streaming connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a streaming connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Socket requested; outbound messages are queued.
    #[default]
    Connecting,
    /// Handshake complete; messages flow both ways.
    Open,
    /// Torn down by the network or by disposal. Terminal.
    Closed,
}

/// Client -> server message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start a subscription.
    Subscribe {
        id: SubscriptionId,
        path: String,
        #[serde(default)]
        input: Option<Value>,
    },
    /// Stop a subscription.
    Unsubscribe { id: SubscriptionId, path: String },
}

/// Server -> client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A pushed value.
    Data { id: SubscriptionId, payload: Value },
    /// The subscription failed on the server. Terminal for that subscription.
    Error { id: SubscriptionId, error: RemoteError },
    /// The server ended the subscription.
    Complete { id: SubscriptionId },
}

impl ServerMessage {
    /// The subscription the message is addressed to.
    pub fn id(&self) -> SubscriptionId {
        match self {
            Self::Data { id, .. } | Self::Error { id, .. } | Self::Complete { id } => *id,
        }
    }
}
