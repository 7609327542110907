//! Response envelope decoding.
//!
//! Successful calls answer `{"value": <json>}`. Application failures answer
//! `{"error": {"code": <i32>, "message": <string>}}`, with any status code.

use serde_json::Value;

use crate::error::{RemoteError, Result, RpcError};

/// Decode a response body into a value or an error.
pub(crate) fn decode(status: u16, body: &str) -> Result<Value> {
    let success = (200..300).contains(&status);

    let parsed = match serde_json::from_str::<Value>(body) {
        Ok(parsed) => parsed,
        Err(e) if success => return Err(RpcError::Decode(e.to_string())),
        Err(_) => return Err(status_error(status, body)),
    };

    let Value::Object(mut fields) = parsed else {
        return Err(if success {
            RpcError::Decode("response body is not an object".into())
        } else {
            status_error(status, body)
        });
    };

    if let Some(error) = fields.remove("error") {
        let remote: RemoteError = serde_json::from_value(error)
            .map_err(|e| RpcError::Decode(format!("malformed error object: {e}")))?;
        return Err(RpcError::Remote(remote));
    }

    if !success {
        return Err(status_error(status, body));
    }

    fields
        .remove("value")
        .ok_or_else(|| RpcError::Decode("response has neither `value` nor `error`".into()))
}

fn status_error(status: u16, body: &str) -> RpcError {
    let body = body.trim();
    if body.is_empty() {
        RpcError::Transport(format!("HTTP {status}"))
    } else {
        RpcError::Transport(format!("HTTP {status}: {body}"))
    }
}
