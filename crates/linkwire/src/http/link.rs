//! Request/response transport.

use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::header::ACCEPT;
use serde_json::Value;
use url::Url;

use super::envelope;
use crate::config::parse_endpoint;
use crate::error::{Result, RpcError};
use crate::link::{Link, Next, Outcome};
use crate::operation::{Operation, OperationKind};

/// Builder for an [`HttpLink`].
pub struct HttpLinkBuilder {
    endpoint: String,
    cookie_jar: Option<Arc<Jar>>,
    user_agent: String,
}

impl HttpLinkBuilder {
    /// Create a builder for the given base endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            cookie_jar: None,
            user_agent: format!("linkwire/{} (Rust)", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Store response cookies in `jar` and send them with every call.
    ///
    /// Share the same jar with a [`WsLink`](crate::ws::WsLink) to carry the
    /// session onto the socket handshake.
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the link.
    pub fn build(self) -> Result<HttpLink> {
        let endpoint = parse_endpoint(&self.endpoint, &["http", "https"])?;
        if endpoint.cannot_be_a_base() {
            return Err(RpcError::InvalidUrl(format!(
                "{endpoint}: cannot be used as a base URL"
            )));
        }

        // No timeout: a call stays pending until the server answers or the
        // caller drops the future.
        let mut builder = reqwest::Client::builder().user_agent(self.user_agent);
        if let Some(jar) = self.cookie_jar {
            builder = builder.cookie_provider(jar);
        }
        let client = builder.build()?;

        Ok(HttpLink {
            inner: Arc::new(HttpLinkInner { client, endpoint }),
        })
    }
}

struct HttpLinkInner {
    client: reqwest::Client,
    endpoint: Url,
}

/// Carries queries and mutations over HTTP.
///
/// Queries are sent as `GET {endpoint}/{key}?input=<json>`, mutations as
/// `POST {endpoint}/{key}` with the input as a JSON body. This is a
/// terminating link: it never calls the rest of the chain.
///
/// # Example
///
/// ```ignore
/// use linkwire::http::HttpLink;
/// use linkwire::Operation;
///
/// let link = HttpLink::new("http://localhost:4000")?;
/// let version = link.send(&Operation::query(["version"], None)).await?;
/// ```
#[derive(Clone)]
pub struct HttpLink {
    inner: Arc<HttpLinkInner>,
}

impl HttpLink {
    /// Create a link for the given endpoint without a cookie jar.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        HttpLinkBuilder::new(endpoint).build()
    }

    /// Create a builder for the given endpoint.
    pub fn builder(endpoint: impl Into<String>) -> HttpLinkBuilder {
        HttpLinkBuilder::new(endpoint)
    }

    /// The base endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Send one operation and decode its result.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Transport`] if the request fails or the server answers
    ///   a non-2xx status without an error envelope
    /// - [`RpcError::Remote`] if the server reports an error
    /// - [`RpcError::Decode`] if the body is not a valid envelope
    pub async fn send(&self, operation: &Operation) -> Result<Value> {
        let url = self.url_for(operation)?;
        let client = &self.inner.client;

        let request = match operation.kind() {
            OperationKind::Query => client.get(url),
            OperationKind::Mutation => {
                client
                    .post(url)
                    .json(operation.input().unwrap_or(&Value::Null))
            }
            OperationKind::Subscription => {
                return Err(not_over_http(operation));
            }
        };

        tracing::trace!(target: "linkwire::http", kind = %operation.kind(), key = %operation.key(), "sending request");

        let response = request.header(ACCEPT, "application/json").send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        envelope::decode(status, &body)
    }

    /// Build the request URL for an operation.
    fn url_for(&self, operation: &Operation) -> Result<Url> {
        let mut url = self.inner.endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                RpcError::InvalidUrl(format!("{}: cannot be a base", self.inner.endpoint))
            })?;
            segments.pop_if_empty().push(&operation.key());
        }

        if operation.kind() == OperationKind::Query
            && let Some(input) = operation.input()
        {
            let encoded =
                serde_json::to_string(input).map_err(|e| RpcError::Encode(e.to_string()))?;
            url.query_pairs_mut().append_pair("input", &encoded);
        }

        Ok(url)
    }
}

impl Link for HttpLink {
    fn route(&self, operation: Operation, _next: Next<'_>) -> Outcome {
        if operation.is_subscription() {
            return Outcome::Failed(not_over_http(&operation));
        }

        let link = self.clone();
        Outcome::Response(Box::pin(async move { link.send(&operation).await }))
    }
}

impl std::fmt::Debug for HttpLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLink")
            .field("endpoint", &self.inner.endpoint.as_str())
            .finish()
    }
}

fn not_over_http(operation: &Operation) -> RpcError {
    RpcError::Unroutable(format!(
        "subscription `{}` cannot be carried over HTTP",
        operation.key()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_url() {
        let link = HttpLink::new("http://localhost:4000").unwrap();
        let url = link.url_for(&Operation::query(["version"], None)).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4000/version");
    }

    #[test]
    fn test_query_url_with_input_and_base_path() {
        let link = HttpLink::new("http://localhost:4000/rpc/").unwrap();
        let op = Operation::query(["users", "get"], Some(json!({ "id": 7 })));
        let url = link.url_for(&op).unwrap();
        assert_eq!(url.path(), "/rpc/users.get");
        let input = url
            .query_pairs()
            .find(|(k, _)| k == "input")
            .map(|(_, v)| v.into_owned());
        assert_eq!(input.as_deref(), Some(r#"{"id":7}"#));
    }

    #[test]
    fn test_mutation_url_has_no_query() {
        let link = HttpLink::new("https://api.example.com").unwrap();
        let op = Operation::mutation(["echo"], Some(json!("hi")));
        let url = link.url_for(&op).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_rejects_ws_endpoint() {
        assert!(matches!(
            HttpLink::new("ws://localhost:4000"),
            Err(RpcError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_route_refuses_subscriptions() {
        let link = HttpLink::new("http://localhost:4000").unwrap();
        let outcome = link.route(Operation::subscription(["pings"], None), Next::end());
        assert!(matches!(outcome, Outcome::Failed(RpcError::Unroutable(_))));
    }
}
