//! Error types and the process-wide error hook.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An application-level failure reported by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Server-defined error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
}

impl RemoteError {
    /// Create a remote error from a code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Errors produced by the client, its links and its transports.
///
/// The type is `Clone` because a single connection failure fans out to
/// every live subscription on that connection.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RpcError {
    /// Network or connection failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// A response or frame did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// The server reported an application-level failure.
    #[error("remote error: {0}")]
    Remote(RemoteError),
    /// The streaming connection was torn down while the subscription was live.
    #[error("connection closed")]
    ConnectionClosed,
    /// The operation input could not be serialized.
    #[error("failed to encode input: {0}")]
    Encode(String),
    /// No link in the chain could carry the operation.
    #[error("operation could not be routed: {0}")]
    Unroutable(String),
    /// An endpoint URL was malformed or used the wrong scheme.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// A header could not be built for a request or handshake.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// [`crate::init`] was called more than once.
    #[error("the process-wide client is already initialized")]
    AlreadyInitialized,
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RpcError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<url::ParseError> for RpcError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<toml::de::Error> for RpcError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// A specialized Result type for client operations.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Receives failures that no pending call or subscription owns.
///
/// Malformed inbound frames, messages for unknown subscriptions, and
/// streaming connection faults end up here. The default hook logs them.
#[derive(Clone)]
pub struct ErrorHook(Arc<dyn Fn(&RpcError) + Send + Sync>);

impl ErrorHook {
    /// Wrap a callback as an error hook.
    pub fn new(hook: impl Fn(&RpcError) + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    /// Report an error to the hook.
    pub fn report(&self, error: &RpcError) {
        (self.0)(error);
    }
}

impl Default for ErrorHook {
    fn default() -> Self {
        Self::new(|error| {
            tracing::error!(target: "linkwire::client", %error, "unhandled client error");
        })
    }
}

impl fmt::Debug for ErrorHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHook").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_remote_error_display() {
        let err = RpcError::Remote(RemoteError::new(404, "procedure not found"));
        assert_eq!(
            err.to_string(),
            "remote error: procedure not found (code 404)"
        );
    }

    #[test]
    fn test_json_error_is_decode() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(RpcError::from(err), RpcError::Decode(_)));
    }

    #[test]
    fn test_url_error_is_invalid_url() {
        let err = url::Url::parse("not a url").unwrap_err();
        assert!(matches!(RpcError::from(err), RpcError::InvalidUrl(_)));
    }

    #[test]
    fn test_hook_receives_reports() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hook = ErrorHook::new(move |e| sink.lock().push(e.clone()));

        hook.report(&RpcError::ConnectionClosed);
        hook.clone().report(&RpcError::Decode("bad frame".into()));

        assert_eq!(
            *seen.lock(),
            vec![
                RpcError::ConnectionClosed,
                RpcError::Decode("bad frame".into())
            ]
        );
    }
}
