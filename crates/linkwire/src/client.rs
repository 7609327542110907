//! The client façade.

use std::sync::Arc;

use reqwest::cookie::Jar;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ErrorHook, Result, RpcError};
use crate::http::HttpLink;
use crate::link::{Link, LinkChain, Outcome, RoutingLink};
use crate::operation::{Operation, OperationKind};
use crate::subscription::{SubscriptionHandlers, Unsubscribe};
use crate::ws::WsLink;

/// Builder for a [`Client`].
///
/// # Example
///
/// ```ignore
/// use linkwire::{Client, ClientConfig, LoggingLink};
///
/// let client = Client::builder()
///     .config(ClientConfig::from_env()?)
///     .link(LoggingLink::new())
///     .on_error(|e| eprintln!("rpc: {e}"))
///     .build()?;
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    on_error: ErrorHook,
    links: Vec<Arc<dyn Link>>,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given endpoints and credential policy.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the global error hook.
    pub fn on_error(mut self, hook: impl Fn(&RpcError) + Send + Sync + 'static) -> Self {
        self.on_error = ErrorHook::new(hook);
        self
    }

    /// Add a policy link. Policy links run in the order added, before the
    /// transport router.
    pub fn link(mut self, link: impl Link + 'static) -> Self {
        self.links.push(Arc::new(link));
        self
    }

    /// Set the user agent sent with HTTP calls.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the client. No connection is opened yet.
    ///
    /// # Errors
    ///
    /// [`RpcError::InvalidUrl`] if either endpoint is malformed or has the
    /// wrong scheme.
    pub fn build(self) -> Result<Client> {
        let config = self.config;
        config.validate()?;

        let jar = config.include_credentials.then(|| Arc::new(Jar::default()));

        let mut http = HttpLink::builder(config.http_endpoint.as_str());
        let mut ws = WsLink::builder(config.ws_endpoint.as_str()).on_error(self.on_error.clone());
        if let Some(jar) = &jar {
            http = http.cookie_jar(jar.clone());
            ws = ws.cookie_jar(jar.clone());
        }
        if let Some(user_agent) = self.user_agent {
            http = http.user_agent(user_agent);
        }

        let mut chain = LinkChain::new();
        for link in self.links {
            chain = chain.with_shared(link);
        }
        let chain = chain
            .with(RoutingLink::new(ws.build()?))
            .with(http.build()?);

        tracing::debug!(
            target: "linkwire::client",
            http = %config.http_endpoint,
            ws = %config.ws_endpoint,
            credentials = config.include_credentials,
            "client created"
        );

        Ok(Client::from_chain(chain, self.on_error))
    }
}

struct ClientInner {
    chain: LinkChain,
    on_error: ErrorHook,
}

/// Entry point for queries, mutations and subscriptions.
///
/// Queries and mutations travel over HTTP; subscriptions share one lazily
/// opened WebSocket. Cloning is cheap and every clone talks through the same
/// links.
///
/// # Example
///
/// ```ignore
/// use linkwire::{Client, ClientConfig, SubscriptionHandlers};
///
/// let client = Client::new(ClientConfig::default())?;
///
/// let version: String = client.query(["version"]).await?;
///
/// let pings = client.add_subscription(
///     ["pings"],
///     SubscriptionHandlers::new(
///         |value| println!("ping {value}"),
///         |error| eprintln!("pings ended: {error}"),
///     ),
/// );
/// // Dropping `pings` unsubscribes.
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a client from a configuration with the default error hook.
    pub fn new(config: ClientConfig) -> Result<Self> {
        ClientBuilder::new().config(config).build()
    }

    /// Create a client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Wrap an already assembled chain.
    pub fn from_chain(chain: LinkChain, on_error: ErrorHook) -> Self {
        Self {
            inner: Arc::new(ClientInner { chain, on_error }),
        }
    }

    /// The global error hook.
    pub fn on_error(&self) -> &ErrorHook {
        &self.inner.on_error
    }

    /// Run a query without input.
    pub async fn query<T: DeserializeOwned>(
        &self,
        path: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<T> {
        self.request(Operation::query(path, None)).await
    }

    /// Run a query with input.
    pub async fn query_with<T: DeserializeOwned, I: Serialize>(
        &self,
        path: impl IntoIterator<Item = impl Into<String>>,
        input: &I,
    ) -> Result<T> {
        self.request(Operation::new(OperationKind::Query, path, Some(encode(input)?)))
            .await
    }

    /// Run a mutation without input.
    pub async fn mutate<T: DeserializeOwned>(
        &self,
        path: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<T> {
        self.request(Operation::mutation(path, None)).await
    }

    /// Run a mutation with input.
    pub async fn mutate_with<T: DeserializeOwned, I: Serialize>(
        &self,
        path: impl IntoIterator<Item = impl Into<String>>,
        input: &I,
    ) -> Result<T> {
        self.request(Operation::new(
            OperationKind::Mutation,
            path,
            Some(encode(input)?),
        ))
        .await
    }

    /// Start a subscription without input.
    ///
    /// Pushed values arrive at `handlers`' data callback in order. Failures
    /// arrive at its error callback, after which no more data is delivered.
    /// Drop or [`cancel`](Unsubscribe::cancel) the returned handle to stop.
    pub fn add_subscription(
        &self,
        path: impl IntoIterator<Item = impl Into<String>>,
        handlers: SubscriptionHandlers,
    ) -> Unsubscribe {
        self.subscribe(Operation::subscription(path, None), handlers)
    }

    /// Start a subscription with input.
    pub fn add_subscription_with<I: Serialize>(
        &self,
        path: impl IntoIterator<Item = impl Into<String>>,
        input: &I,
        handlers: SubscriptionHandlers,
    ) -> Unsubscribe {
        match encode(input) {
            Ok(input) => self.subscribe(Operation::subscription(path, Some(input)), handlers),
            Err(error) => {
                handlers.error(error);
                Unsubscribe::inert()
            }
        }
    }

    /// Close the streaming connection. Live subscriptions receive
    /// [`RpcError::ConnectionClosed`]. A later subscription reconnects.
    pub fn dispose(&self) {
        tracing::debug!(target: "linkwire::client", "disposing client");
        self.inner.chain.dispose();
    }

    async fn request<T: DeserializeOwned>(&self, operation: Operation) -> Result<T> {
        let key = operation.key();
        let value = match self.inner.chain.dispatch(operation) {
            Outcome::Response(fut) => fut.await?,
            Outcome::Subscription(_) => {
                return Err(RpcError::Unroutable(format!(
                    "`{key}` was routed as a subscription"
                )));
            }
            Outcome::Failed(error) => return Err(error),
        };

        serde_json::from_value(value)
            .map_err(|e| RpcError::Decode(format!("result of `{key}`: {e}")))
    }

    fn subscribe(&self, operation: Operation, handlers: SubscriptionHandlers) -> Unsubscribe {
        let key = operation.key();
        match self.inner.chain.dispatch(operation) {
            Outcome::Subscription(pending) => pending.start(handlers),
            Outcome::Response(_) => {
                handlers.error(RpcError::Unroutable(format!(
                    "`{key}` was routed as a request"
                )));
                Unsubscribe::inert()
            }
            Outcome::Failed(error) => {
                tracing::debug!(target: "linkwire::client", %key, %error, "subscription not started");
                handlers.error(error);
                Unsubscribe::inert()
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("chain", &self.inner.chain)
            .finish_non_exhaustive()
    }
}

fn encode<I: Serialize>(input: &I) -> Result<Value> {
    serde_json::to_value(input).map_err(|e| RpcError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Next;
    use crate::subscription::PendingSubscription;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Echoes requests and emits one value per subscription.
    struct EchoLink;

    impl Link for EchoLink {
        fn route(&self, operation: Operation, _next: Next<'_>) -> Outcome {
            match operation.kind() {
                OperationKind::Subscription => {
                    let key = operation.key();
                    Outcome::Subscription(PendingSubscription::new(move |handlers| {
                        handlers.data(json!(key));
                        Unsubscribe::inert()
                    }))
                }
                _ => {
                    let value = json!({ "key": operation.key(), "input": operation.input() });
                    Outcome::Response(Box::pin(async move { Ok(value) }))
                }
            }
        }
    }

    fn echo_client() -> Client {
        Client::from_chain(LinkChain::new().with(EchoLink), ErrorHook::default())
    }

    #[tokio::test]
    async fn test_query_decodes_result() {
        let client = echo_client();
        let value: Value = client.query_with(["users", "get"], &json!({ "id": 1 })).await.unwrap();
        assert_eq!(value, json!({ "key": "users.get", "input": { "id": 1 } }));
    }

    #[tokio::test]
    async fn test_decode_mismatch() {
        let client = echo_client();
        let result: Result<u32> = client.mutate(["echo"]).await;
        assert!(matches!(result, Err(RpcError::Decode(_))));
    }

    #[tokio::test]
    async fn test_empty_chain_is_unroutable() {
        let client = Client::from_chain(LinkChain::new(), ErrorHook::default());
        let result: Result<Value> = client.query(["version"]).await;
        assert!(matches!(result, Err(RpcError::Unroutable(_))));
    }

    #[test]
    fn test_subscription_starts_with_handlers() {
        let client = echo_client();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _handle = client.add_subscription(
            ["pings"],
            SubscriptionHandlers::new(move |v| sink.lock().push(v), |_| {}),
        );
        assert_eq!(*seen.lock(), vec![json!("pings")]);
    }

    #[test]
    fn test_subscription_routing_failure_goes_to_handler() {
        let client = Client::from_chain(LinkChain::new(), ErrorHook::default());
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        let handle = client.add_subscription(
            ["pings"],
            SubscriptionHandlers::new(|_| {}, move |e| sink.lock().push(e)),
        );
        assert!(handle.is_cancelled());
        assert!(matches!(errors.lock()[0], RpcError::Unroutable(_)));
    }

    #[test]
    fn test_builder_rejects_bad_endpoints() {
        let result = Client::builder()
            .config(ClientConfig::new("ftp://example.com", "ws://example.com/ws"))
            .build();
        assert!(matches!(result, Err(RpcError::InvalidUrl(_))));
    }

    #[test]
    fn test_builder_places_policy_links_first() {
        let client = Client::builder()
            .link(crate::link::LoggingLink::new())
            .build()
            .unwrap();
        assert_eq!(client.inner.chain.len(), 3);
    }
}
