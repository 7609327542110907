//! Client configuration.
//!
//! Recognized options are `httpEndpoint`, `wsEndpoint` and
//! `includeCredentials`. They can be set with builder methods, read from a
//! TOML document (camelCase or snake_case keys), or taken from the
//! environment:
//!
//! - `LINKWIRE_HTTP_ENDPOINT`
//! - `LINKWIRE_WS_ENDPOINT`
//! - `LINKWIRE_INCLUDE_CREDENTIALS` (`true`/`false`, `1`/`0`, `yes`/`no`)

use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::error::{Result, RpcError};

/// Default HTTP endpoint.
pub const DEFAULT_HTTP_ENDPOINT: &str = "http://localtest.me:4000";
/// Default WebSocket endpoint.
pub const DEFAULT_WS_ENDPOINT: &str = "ws://localtest.me:4000/ws";

const ENV_HTTP_ENDPOINT: &str = "LINKWIRE_HTTP_ENDPOINT";
const ENV_WS_ENDPOINT: &str = "LINKWIRE_WS_ENDPOINT";
const ENV_INCLUDE_CREDENTIALS: &str = "LINKWIRE_INCLUDE_CREDENTIALS";

/// Endpoints and credential policy for a [`Client`](crate::Client).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL for request/response calls (http:// or https://).
    #[serde(alias = "http_endpoint")]
    pub http_endpoint: String,
    /// URL of the streaming socket (ws:// or wss://).
    #[serde(alias = "ws_endpoint")]
    pub ws_endpoint: String,
    /// Keep a cookie jar and send its cookies with every call and handshake.
    #[serde(alias = "include_credentials")]
    pub include_credentials: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_endpoint: DEFAULT_HTTP_ENDPOINT.to_string(),
            ws_endpoint: DEFAULT_WS_ENDPOINT.to_string(),
            include_credentials: true,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with the given endpoints.
    pub fn new(http_endpoint: impl Into<String>, ws_endpoint: impl Into<String>) -> Self {
        Self {
            http_endpoint: http_endpoint.into(),
            ws_endpoint: ws_endpoint.into(),
            ..Self::default()
        }
    }

    /// Set the HTTP endpoint.
    pub fn http_endpoint(mut self, url: impl Into<String>) -> Self {
        self.http_endpoint = url.into();
        self
    }

    /// Set the WebSocket endpoint.
    pub fn ws_endpoint(mut self, url: impl Into<String>) -> Self {
        self.ws_endpoint = url.into();
        self
    }

    /// Set whether cookies are stored and sent.
    pub fn include_credentials(mut self, include: bool) -> Self {
        self.include_credentials = include;
        self
    }

    /// Load configuration from the process environment.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_HTTP_ENDPOINT).filter(|s| !s.is_empty()) {
            config.http_endpoint = url;
        }
        if let Some(url) = lookup(ENV_WS_ENDPOINT).filter(|s| !s.is_empty()) {
            config.ws_endpoint = url;
        }
        if let Some(raw) = lookup(ENV_INCLUDE_CREDENTIALS).filter(|s| !s.is_empty()) {
            config.include_credentials = parse_bool(&raw).ok_or_else(|| {
                RpcError::Config(format!("{ENV_INCLUDE_CREDENTIALS}: expected a boolean, got `{raw}`"))
            })?;
        }

        Ok(config)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Read configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| RpcError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Parse and check the HTTP endpoint.
    pub fn http_url(&self) -> Result<Url> {
        parse_endpoint(&self.http_endpoint, &["http", "https"])
    }

    /// Parse and check the WebSocket endpoint.
    pub fn ws_url(&self) -> Result<Url> {
        parse_endpoint(&self.ws_endpoint, &["ws", "wss"])
    }

    /// Check both endpoints.
    pub fn validate(&self) -> Result<()> {
        self.http_url()?;
        self.ws_url()?;
        Ok(())
    }
}

pub(crate) fn parse_endpoint(raw: &str, schemes: &[&str]) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| RpcError::InvalidUrl(format!("{raw}: {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(RpcError::InvalidUrl(format!(
            "{raw}: expected scheme {}",
            schemes.join(" or ")
        )));
    }
    Ok(url)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
