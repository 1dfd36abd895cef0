use crate::{
    collections::ConcurrentMap,
    config::ExecutorConfig,
    graph::{DirectedAcyclicWorkGraph, GraphError},
    sync::RwLock,
    task::TaskExecutionError,
    types::{IndexMap, NodeId},
};
use std::{sync::Arc, time::SystemTime};
use tracing::{debug, info, warn};

/// Recorded outcome of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStatus {
    pub success: bool,
    pub timestamp: SystemTime,
}

/// Node ids of a tracked layered run, split by outcome.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub succeeded: Vec<NodeId>,
    pub failed: Vec<TaskExecutionError>,
}

impl ExecutionReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-node outcome log bound to one graph.
///
/// A failed node is removed from the graph as soon as its result is
/// registered, together with its edges. Its dependants stay in the graph with
/// one prerequisite fewer; they are not failed transitively.
#[derive(Debug)]
pub struct StateObject {
    graph: RwLock<Option<Arc<DirectedAcyclicWorkGraph>>>,
    statuses: ConcurrentMap<NodeId, NodeStatus>,
}

impl StateObject {
    #[must_use]
    pub fn new(graph: Arc<DirectedAcyclicWorkGraph>) -> Self {
        Self {
            graph: RwLock::new(Some(graph)),
            statuses: ConcurrentMap::new(),
        }
    }

    /// The bound graph; `None` after [`Self::dispose`].
    pub fn graph(&self) -> Option<Arc<DirectedAcyclicWorkGraph>> {
        self.graph.read().clone()
    }

    /// Record `success` for `node` with the current time. On failure the
    /// node is pruned from the graph. No-op once disposed.
    ///
    /// # Errors
    /// If pruning fails for a reason other than the node already being gone.
    pub fn register_node_result(
        &self,
        node: impl Into<NodeId>,
        success: bool,
    ) -> Result<(), GraphError> {
        let node = node.into();
        let status = NodeStatus {
            success,
            timestamp: SystemTime::now(),
        };
        self.statuses
            .insert(node.clone(), status)
            .expect("StateObject::register_node_result: [1]");
        if success {
            debug!(%node, "node succeeded");
            return Ok(());
        }
        let Some(graph) = self.graph() else {
            return Ok(());
        };
        match graph.remove_node_by_id(node.as_str()) {
            Ok(_) => {
                warn!(%node, "failed node pruned from the graph");
                Ok(())
            }
            Err(GraphError::NodeNotFound(_)) => {
                debug!(%node, "failed node was already gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Snapshot of every recorded status in registration order.
    pub fn get_all_statuses(&self) -> IndexMap<NodeId, NodeStatus> {
        self.statuses.to_map()
    }

    pub fn get_status(&self, node: &str) -> Option<NodeStatus> {
        self.statuses.get(node)
    }

    /// Run the bound graph layer by layer, registering every node's outcome
    /// as its layer drains. Failed nodes are pruned and the run continues
    /// with whatever remains runnable.
    ///
    /// # Errors
    /// If the graph is cyclic or the worker pool cannot be built. Node
    /// failures are reported in the [`ExecutionReport`] instead.
    pub fn execute_layered(&self, config: &ExecutorConfig) -> Result<ExecutionReport, GraphError> {
        let mut report = ExecutionReport::default();
        let Some(graph) = self.graph() else {
            return Ok(report);
        };
        graph.run_layers(config, |_, outcomes| {
            for (node, outcome) in outcomes {
                self.register_node_result(node.clone(), outcome.is_ok())?;
                match outcome {
                    Ok(()) => report.succeeded.push(node),
                    Err(err) => report.failed.push(err),
                }
            }
            Ok(())
        })?;
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "tracked execution finished"
        );
        Ok(report)
    }

    /// Clear the statuses and release the graph. Idempotent.
    pub fn dispose(&self) {
        self.statuses.dispose();
        if self.graph.write().take().is_some() {
            debug!("state object disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.statuses.is_disposed()
    }
}
