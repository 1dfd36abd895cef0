use crate::types::NodeId;
use std::{error::Error as StdError, sync::Arc};
use thiserror::Error;

/// A unit of work queued on a [`Node`](crate::graph::Node).
///
/// Tasks run in insertion order; the first `Err` halts the node.
pub type Task = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Hook invoked after a node's own tasks have completed.
///
/// A context is typically bound to a
/// [`StateObject`](crate::state::StateObject) and reports the node's outcome
/// into it.
pub trait ExecutionContext: Send + Sync {
    /// Run after every task of the owning node succeeded.
    ///
    /// # Errors
    /// Any error is reported as the node's failure.
    fn execute(&self) -> anyhow::Result<()>;

    /// Release whatever the context holds. Called when the owning node is
    /// disposed; must be idempotent.
    fn dispose(&self) {}
}

/// A node's task or execution context failed, or panicked.
#[derive(Debug, Error)]
#[error("task of node {node} failed: {source}")]
pub struct TaskExecutionError {
    node: NodeId,
    #[source]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

impl TaskExecutionError {
    pub(crate) fn new(node: NodeId, cause: anyhow::Error) -> Self {
        Self {
            node,
            source: cause.into(),
        }
    }

    pub(crate) fn panicked(node: NodeId, message: &str) -> Self {
        Self::new(node, anyhow::anyhow!("panicked: {message}"))
    }

    /// Identifier of the failing node.
    #[must_use]
    pub fn node(&self) -> &NodeId {
        &self.node
    }
}
