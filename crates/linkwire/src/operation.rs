//! Operation descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of an RPC operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// A read-only call answered with a single value.
    Query,
    /// A call that modifies server state, answered with a single value.
    Mutation,
    /// A long-lived registration that receives pushed values.
    Subscription,
}

impl OperationKind {
    /// Lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing RPC call.
///
/// Built by the client for each call and consumed once by the link chain.
///
/// # Example
///
/// ```ignore
/// use linkwire::{Operation, OperationKind};
///
/// let op = Operation::query(["users", "get"], Some(serde_json::json!({ "id": 7 })));
/// assert_eq!(op.kind(), OperationKind::Query);
/// assert_eq!(op.key(), "users.get");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    kind: OperationKind,
    path: Vec<String>,
    input: Option<Value>,
}

impl Operation {
    /// Create an operation of the given kind.
    pub fn new(
        kind: OperationKind,
        path: impl IntoIterator<Item = impl Into<String>>,
        input: Option<Value>,
    ) -> Self {
        Self {
            kind,
            path: path.into_iter().map(Into::into).collect(),
            input,
        }
    }

    /// Create a query operation.
    pub fn query(path: impl IntoIterator<Item = impl Into<String>>, input: Option<Value>) -> Self {
        Self::new(OperationKind::Query, path, input)
    }

    /// Create a mutation operation.
    pub fn mutation(
        path: impl IntoIterator<Item = impl Into<String>>,
        input: Option<Value>,
    ) -> Self {
        Self::new(OperationKind::Mutation, path, input)
    }

    /// Create a subscription operation.
    pub fn subscription(
        path: impl IntoIterator<Item = impl Into<String>>,
        input: Option<Value>,
    ) -> Self {
        Self::new(OperationKind::Subscription, path, input)
    }

    /// The operation kind.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Path segments naming the remote procedure.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The serialized input, if any.
    pub fn input(&self) -> Option<&Value> {
        self.input.as_ref()
    }

    /// Procedure key as sent on the wire: the path segments joined by `.`.
    pub fn key(&self) -> String {
        self.path.join(".")
    }

    /// Check whether this is a subscription.
    pub fn is_subscription(&self) -> bool {
        self.kind == OperationKind::Subscription
    }
}
