//! Operation logging link.

use super::{Link, Next, Outcome};
use crate::operation::Operation;

/// Logs every operation at debug level and forwards it unchanged.
#[derive(Clone, Debug, Default)]
pub struct LoggingLink {
    _private: (),
}

impl LoggingLink {
    /// Create a logging link.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Link for LoggingLink {
    fn route(&self, operation: Operation, next: Next<'_>) -> Outcome {
        let kind = operation.kind();
        let key = operation.key();
        tracing::debug!(target: "linkwire::link", %kind, %key, "dispatching operation");

        match next.run(operation) {
            Outcome::Response(fut) => Outcome::Response(Box::pin(async move {
                let result = fut.await;
                if let Err(ref error) = result {
                    tracing::debug!(target: "linkwire::link", %kind, %key, %error, "operation failed");
                }
                result
            })),
            Outcome::Failed(error) => {
                tracing::debug!(target: "linkwire::link", %kind, %key, %error, "operation not routed");
                Outcome::Failed(error)
            }
            outcome => outcome,
        }
    }
}
