//! Subscription callbacks and cancellation handles.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::RpcError;

type DataCallback = Box<dyn Fn(Value) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(RpcError) + Send + Sync>;

struct Handlers {
    on_data: DataCallback,
    on_error: ErrorCallback,
}

/// The `on_data`/`on_error` pair attached to one subscription.
///
/// Cloning shares the same callbacks.
#[derive(Clone)]
pub struct SubscriptionHandlers {
    inner: Arc<Handlers>,
}

impl SubscriptionHandlers {
    /// Create handlers from a data callback and an error callback.
    pub fn new(
        on_data: impl Fn(Value) + Send + Sync + 'static,
        on_error: impl Fn(RpcError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Handlers {
                on_data: Box::new(on_data),
                on_error: Box::new(on_error),
            }),
        }
    }

    /// Deliver a pushed value.
    pub fn data(&self, value: Value) {
        (self.inner.on_data)(value);
    }

    /// Deliver an error.
    pub fn error(&self, error: RpcError) {
        (self.inner.on_error)(error);
    }
}

impl fmt::Debug for SubscriptionHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandlers").finish_non_exhaustive()
    }
}

/// A subscription a link has routed but not yet started.
///
/// The client starts it with the caller's handlers, which registers the
/// subscription with the transport.
pub struct PendingSubscription {
    start: Box<dyn FnOnce(SubscriptionHandlers) -> Unsubscribe + Send>,
}

impl PendingSubscription {
    /// Wrap the function that registers the subscription.
    pub fn new(start: impl FnOnce(SubscriptionHandlers) -> Unsubscribe + Send + 'static) -> Self {
        Self {
            start: Box::new(start),
        }
    }

    /// Register the subscription with the given handlers.
    pub fn start(self, handlers: SubscriptionHandlers) -> Unsubscribe {
        (self.start)(handlers)
    }
}

impl fmt::Debug for PendingSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSubscription").finish_non_exhaustive()
    }
}

/// Cancels a subscription.
///
/// [`cancel`](Self::cancel) is idempotent: only the first call has an
/// effect. Dropping the handle cancels the subscription, so keep it alive
/// for as long as the subscription should run.
#[must_use = "dropping an Unsubscribe cancels the subscription"]
pub struct Unsubscribe {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Unsubscribe {
    /// Create a handle that runs `cancel` on first cancellation.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// A handle with nothing to cancel, returned when a subscription never started.
    pub fn inert() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    /// Cancel the subscription.
    pub fn cancel(&self) {
        // Take under the lock, run outside it.
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Check whether the handle has already been cancelled (or was inert).
    pub fn is_cancelled(&self) -> bool {
        self.cancel.lock().is_none()
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
