//! Subscription-aware routing.

use std::sync::Arc;

use super::{Link, Next, Outcome};
use crate::operation::{Operation, OperationKind};

/// Sends subscriptions to a streaming link and everything else down the chain.
///
/// The decision depends only on [`Operation::kind`]. Subscriptions are handed
/// to the streaming link with an empty continuation, so `next` is never
/// called for them. Errors from either side pass through untouched.
pub struct RoutingLink {
    streaming: Arc<dyn Link>,
}

impl RoutingLink {
    /// Route subscriptions to `streaming`, normally a [`WsLink`](crate::ws::WsLink).
    pub fn new(streaming: impl Link + 'static) -> Self {
        Self {
            streaming: Arc::new(streaming),
        }
    }

    /// Route subscriptions to a shared streaming link.
    pub fn shared(streaming: Arc<dyn Link>) -> Self {
        Self { streaming }
    }
}

impl Link for RoutingLink {
    fn route(&self, operation: Operation, next: Next<'_>) -> Outcome {
        match operation.kind() {
            OperationKind::Subscription => self.streaming.route(operation, Next::end()),
            OperationKind::Query | OperationKind::Mutation => next.run(operation),
        }
    }

    fn dispose(&self) {
        self.streaming.dispose();
    }
}

impl std::fmt::Debug for RoutingLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingLink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkChain;
    use crate::link::testing::CountingLink;

    fn chain() -> (Arc<CountingLink>, Arc<CountingLink>, LinkChain) {
        let streaming = Arc::new(CountingLink::default());
        let terminal = Arc::new(CountingLink::default());
        let chain = LinkChain::new()
            .with(RoutingLink::new(streaming.clone()))
            .with(terminal.clone());
        (streaming, terminal, chain)
    }

    #[test]
    fn test_requests_go_down_the_chain() {
        let (streaming, terminal, chain) = chain();

        let outcome = chain.dispatch(Operation::query(["version"], None));
        assert!(matches!(outcome, Outcome::Response(_)));
        let outcome = chain.dispatch(Operation::mutation(["echo"], None));
        assert!(matches!(outcome, Outcome::Response(_)));

        assert_eq!(terminal.calls(), 2);
        assert_eq!(streaming.calls(), 0);
    }

    #[test]
    fn test_subscriptions_bypass_next() {
        let (streaming, terminal, chain) = chain();

        let outcome = chain.dispatch(Operation::subscription(["pings"], None));
        assert!(matches!(outcome, Outcome::Subscription(_)));

        assert_eq!(streaming.calls(), 1);
        assert_eq!(terminal.calls(), 0);
    }

    #[test]
    fn test_streaming_link_cannot_continue_the_chain() {
        struct Forwarder;
        impl Link for Forwarder {
            fn route(&self, operation: Operation, next: Next<'_>) -> Outcome {
                assert!(next.is_empty());
                next.run(operation)
            }
        }

        let terminal = Arc::new(CountingLink::default());
        let chain = LinkChain::new()
            .with(RoutingLink::new(Forwarder))
            .with(terminal.clone());

        let outcome = chain.dispatch(Operation::subscription(["pings"], None));
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(terminal.calls(), 0);
    }

    #[test]
    fn test_dispose_reaches_streaming_link() {
        let (streaming, _terminal, chain) = chain();
        chain.dispose();
        assert_eq!(
            streaming
                .disposed
                .load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }
}
