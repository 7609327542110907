//! Composable links that decide which transport carries an operation.
//!
//! A [`LinkChain`] is an ordered list of [`Link`]s. Each link receives the
//! operation and a [`Next`] continuation over the rest of the chain. It
//! either answers the operation itself (a terminating link such as
//! [`HttpLink`](crate::http::HttpLink)) or hands it on with [`Next::run`].
//!
//! # Example
//!
//! ```ignore
//! use linkwire::http::HttpLink;
//! use linkwire::link::{LinkChain, LoggingLink, RoutingLink};
//! use linkwire::ws::WsLink;
//!
//! let chain = LinkChain::new()
//!     .with(LoggingLink::new())
//!     .with(RoutingLink::new(ws_link))
//!     .with(http_link);
//! ```

mod logging;
mod routing;

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::{Result, RpcError};
use crate::operation::Operation;
use crate::subscription::PendingSubscription;

pub use logging::LoggingLink;
pub use routing::RoutingLink;

/// Future resolving to the decoded result of a request/response call.
pub type ResponseFuture = BoxFuture<'static, Result<Value>>;

/// What a link produced for an operation.
pub enum Outcome {
    /// A single result will arrive.
    Response(ResponseFuture),
    /// A subscription ready to be started with handlers.
    Subscription(PendingSubscription),
    /// The operation could not be routed.
    Failed(RpcError),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(_) => f.write_str("Outcome::Response(..)"),
            Self::Subscription(_) => f.write_str("Outcome::Subscription(..)"),
            Self::Failed(err) => f.debug_tuple("Outcome::Failed").field(err).finish(),
        }
    }
}

/// A routing decision unit in a [`LinkChain`].
pub trait Link: Send + Sync {
    /// Route `operation`, optionally by delegating to `next`.
    fn route(&self, operation: Operation, next: Next<'_>) -> Outcome;

    /// Release transport resources held by this link.
    fn dispose(&self) {}
}

/// The remainder of a link chain.
///
/// `run` takes `self` by value, so a link can forward at most once.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Link>],
}

impl Next<'static> {
    /// A continuation with no links left.
    pub fn end() -> Self {
        Next { remaining: &[] }
    }
}

impl Next<'_> {
    /// Hand the operation to the next link.
    ///
    /// Fails with [`RpcError::Unroutable`] if the chain is exhausted.
    pub fn run(self, operation: Operation) -> Outcome {
        match self.remaining.split_first() {
            Some((link, rest)) => link.route(operation, Next { remaining: rest }),
            None => Outcome::Failed(RpcError::Unroutable(format!(
                "no terminating link for {} `{}`",
                operation.kind(),
                operation.key()
            ))),
        }
    }

    /// Number of links left in the chain.
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    /// Check whether the chain is exhausted.
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// An ordered list of links.
#[derive(Clone, Default)]
pub struct LinkChain {
    links: Vec<Arc<dyn Link>>,
}

impl LinkChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a link.
    pub fn with(mut self, link: impl Link + 'static) -> Self {
        self.links.push(Arc::new(link));
        self
    }

    /// Append a shared link.
    pub fn with_shared(mut self, link: Arc<dyn Link>) -> Self {
        self.links.push(link);
        self
    }

    /// Route an operation through the chain, starting at the first link.
    pub fn dispatch(&self, operation: Operation) -> Outcome {
        Next {
            remaining: &self.links,
        }
        .run(operation)
    }

    /// Dispose every link in the chain.
    pub fn dispose(&self) {
        for link in &self.links {
            link.dispose();
        }
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Check whether the chain has no links.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl fmt::Debug for LinkChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkChain")
            .field("links", &self.links.len())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::CountingLink;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Forwarding(AtomicUsize);

    impl Link for Forwarding {
        fn route(&self, operation: Operation, next: Next<'_>) -> Outcome {
            self.0.fetch_add(1, Ordering::SeqCst);
            next.run(operation)
        }
    }

    #[tokio::test]
    async fn test_chain_reaches_terminal_link() {
        let terminal = Arc::new(CountingLink::default());
        let chain = LinkChain::new()
            .with(Forwarding(AtomicUsize::new(0)))
            .with(terminal.clone());

        let Outcome::Response(fut) = chain.dispatch(Operation::query(["version"], None)) else {
            panic!("expected a response outcome");
        };
        assert_eq!(fut.await.unwrap(), Value::String("version".into()));
        assert_eq!(terminal.calls(), 1);
    }

    #[test]
    fn test_exhausted_chain_fails() {
        let chain = LinkChain::new().with(Forwarding(AtomicUsize::new(0)));
        match chain.dispatch(Operation::mutation(["user", "create"], None)) {
            Outcome::Failed(RpcError::Unroutable(msg)) => {
                assert!(msg.contains("user.create"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_empty_chain_fails() {
        let chain = LinkChain::new();
        assert!(chain.is_empty());
        assert!(matches!(
            chain.dispatch(Operation::query(["a"], None)),
            Outcome::Failed(_)
        ));
    }

    #[test]
    fn test_dispose_reaches_every_link() {
        let a = Arc::new(CountingLink::default());
        let b = Arc::new(CountingLink::default());
        let chain = LinkChain::new().with(a.clone()).with(b.clone());
        chain.dispose();
        assert_eq!(a.disposed.load(Ordering::SeqCst), 1);
        assert_eq!(b.disposed.load(Ordering::SeqCst), 1);
    }
}
