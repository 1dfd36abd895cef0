mod edge;
mod execute;
mod node;
mod sort;

pub use crate::graph::{edge::Edge, node::Node};
use crate::{
    collections::{ConcurrentMap, ConcurrentSet, ContainerError},
    sync::{AtomicBool, Mutex, Ordering},
    task::TaskExecutionError,
    types::NodeId,
};
use core::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors produced by structural mutation, sorting and execution of a
/// [`DirectedAcyclicWorkGraph`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GraphError {
    /// No topological order exists.
    #[error("graph contains cycle(s); unresolved nodes: {unresolved:?}")]
    CycleDetected {
        /// Nodes that still had unexecuted prerequisites when sorting stalled,
        /// in insertion order.
        unresolved: Vec<NodeId>,
    },
    /// The node is not registered in this graph.
    #[error("node {0} is not part of the graph")]
    NodeNotFound(NodeId),
    /// The edge is not registered in this graph.
    #[error("edge {from} -> {to} is not part of the graph")]
    EdgeNotFound {
        /// Id of the edge's source.
        from: NodeId,
        /// Id of the edge's target.
        to: NodeId,
    },
    /// Another node with the same id is already registered.
    #[error("a different node with id {0} is already part of the graph")]
    DuplicateNode(NodeId),
    /// A single node failed.
    #[error(transparent)]
    Task(#[from] TaskExecutionError),
    /// Several nodes of one layer failed.
    #[error("{count} node(s) failed in layer {index}", count = .failures.len())]
    Layer {
        /// Zero-based layer index.
        index: usize,
        /// Every failure of the layer.
        failures: Vec<TaskExecutionError>,
    },
    /// `execute_layered` was asked for zero workers.
    #[error("layered execution needs at least one worker")]
    ZeroWorkers,
    /// The worker pool could not be built.
    #[error("failed to build the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl GraphError {
    pub(crate) fn from_layer_failures(
        index: usize,
        mut failures: Vec<TaskExecutionError>,
    ) -> Option<Self> {
        match failures.len() {
            0 => None,
            1 => failures.pop().map(Self::Task),
            _ => Some(Self::Layer { index, failures }),
        }
    }

    /// Task failures carried by this error, if any.
    #[must_use]
    pub fn task_failures(&self) -> &[TaskExecutionError] {
        match self {
            Self::Task(failure) => core::slice::from_ref(failure),
            Self::Layer { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Dependency graph of task [`Node`]s.
///
/// Structural mutations are serialized by one lock, so a node and the edges
/// touching it are always added and removed together. The graph owns
/// reference cycles between nodes and edges; [`Self::dispose`], also run on
/// drop, breaks them.
pub struct DirectedAcyclicWorkGraph {
    nodes: ConcurrentMap<NodeId, Arc<Node>>,
    edges: ConcurrentSet<Edge>,
    structure: Mutex<()>,
    disposed: AtomicBool,
}

impl DirectedAcyclicWorkGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: ConcurrentMap::new(),
            edges: ConcurrentSet::new(),
            structure: Mutex::new(()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Register `node`. Re-adding the same node is a no-op.
    ///
    /// # Errors
    /// [`GraphError::DuplicateNode`] if a different node with the same id is
    /// registered.
    pub fn add_node(&self, node: Arc<Node>) -> Result<(), GraphError> {
        let _structure = self.structure.lock();
        if let Some(existing) = self.nodes.get(node.id()) {
            if Arc::ptr_eq(&existing, &node) {
                return Ok(());
            }
            return Err(GraphError::DuplicateNode(node.id().clone()));
        }
        debug!(node = %node.id(), "node added");
        self.nodes.insert(node.id().clone(), node)?;
        Ok(())
    }

    /// Unregister `node` together with every edge touching it.
    ///
    /// # Errors
    /// [`GraphError::NodeNotFound`] if `node` is not registered here.
    pub fn remove_node(&self, node: &Arc<Node>) -> Result<(), GraphError> {
        let _structure = self.structure.lock();
        match self.nodes.get(node.id()) {
            Some(registered) if Arc::ptr_eq(&registered, node) => self.detach(node),
            _ => Err(GraphError::NodeNotFound(node.id().clone())),
        }
    }

    /// [`Self::remove_node`] by id; returns the removed node.
    ///
    /// # Errors
    /// [`GraphError::NodeNotFound`] if no node has this id.
    pub fn remove_node_by_id(&self, id: &str) -> Result<Arc<Node>, GraphError> {
        let _structure = self.structure.lock();
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(NodeId::new(id)))?;
        self.detach(&node)?;
        Ok(node)
    }

    /// Caller holds the structural lock.
    fn detach(&self, node: &Arc<Node>) -> Result<(), GraphError> {
        let touching = self.edges.filter(|edge| edge.touches(node)).to_vec();
        for edge in &touching {
            self.edges.discard(edge)?;
            edge.source().unlink(edge);
            edge.target().unlink(edge);
        }
        self.nodes.remove(node.id())?;
        debug!(node = %node.id(), edges = touching.len(), "node removed");
        Ok(())
    }

    /// Register `edge` and back-fill the adjacency of both endpoints.
    /// Re-adding the same edge is a no-op.
    ///
    /// # Errors
    /// [`GraphError::NodeNotFound`] if an endpoint is not registered here.
    pub fn add_edge(&self, edge: Edge) -> Result<(), GraphError> {
        let _structure = self.structure.lock();
        for endpoint in [edge.source(), edge.target()] {
            match self.nodes.get(endpoint.id()) {
                Some(registered) if Arc::ptr_eq(&registered, endpoint) => {}
                _ => return Err(GraphError::NodeNotFound(endpoint.id().clone())),
            }
        }
        if !self.edges.insert(edge.clone())? {
            return Ok(());
        }
        debug!(?edge, "edge added");
        edge.source().link_outgoing(edge.clone());
        let target = Arc::clone(edge.target());
        target.link_incoming(edge);
        Ok(())
    }

    /// Unregister `edge` and retract it from both endpoints.
    ///
    /// # Errors
    /// [`GraphError::EdgeNotFound`] if `edge` is not registered here.
    pub fn remove_edge(&self, edge: &Edge) -> Result<(), GraphError> {
        let _structure = self.structure.lock();
        if !self.edges.contains(edge) {
            return Err(GraphError::EdgeNotFound {
                from: edge.source().id().clone(),
                to: edge.target().id().clone(),
            });
        }
        self.edges.discard(edge)?;
        edge.source().unlink(edge);
        edge.target().unlink(edge);
        debug!(?edge, "edge removed");
        Ok(())
    }

    pub fn get_node(&self, id: &str) -> Option<Arc<Node>> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Registered nodes in insertion order.
    pub fn get_nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.values()
    }

    /// Registered edges in insertion order.
    pub fn get_edges(&self) -> Vec<Edge> {
        self.edges.to_vec()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Consistent copy of both collections.
    pub(crate) fn snapshot(&self) -> (Vec<Arc<Node>>, Vec<Edge>) {
        let _structure = self.structure.lock();
        (self.get_nodes(), self.get_edges())
    }

    /// Dispose every node, then clear both collections. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _structure = self.structure.lock();
        let nodes = self.nodes.values();
        for node in &nodes {
            node.dispose();
        }
        self.edges.dispose();
        self.nodes.dispose();
        info!(nodes = nodes.len(), "graph disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Default for DirectedAcyclicWorkGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DirectedAcyclicWorkGraph {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for DirectedAcyclicWorkGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectedAcyclicWorkGraph")
            .field("nodes", &self.nodes.keys())
            .field("edges", &self.edges)
            .finish()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    fn graph_with(ids: &[&str]) -> (DirectedAcyclicWorkGraph, Vec<Arc<Node>>) {
        let graph = DirectedAcyclicWorkGraph::new();
        let nodes: Vec<_> = ids.iter().map(|&id| Node::new(id)).collect();
        for node in &nodes {
            graph.add_node(Arc::clone(node)).unwrap();
        }
        (graph, nodes)
    }

    #[test]
    fn add_edge_back_fills_adjacency() {
        let (graph, nodes) = graph_with(&["A", "B"]);
        let edge = Edge::new(&nodes[0], &nodes[1]);
        graph.add_edge(edge.clone()).unwrap();
        graph.add_edge(edge.clone()).unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(nodes[0].get_outgoing_edges(), [edge.clone()]);
        assert_eq!(nodes[1].get_incoming_edges(), [edge]);
    }

    #[test]
    fn add_edge_rejects_foreign_endpoint() {
        let (graph, nodes) = graph_with(&["A"]);
        let stranger = Node::new("B");
        let err = graph.add_edge(Edge::new(&nodes[0], &stranger)).unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound(id) if id == "B"));
        assert!(nodes[0].get_outgoing_edges().is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let (graph, nodes) = graph_with(&["A"]);
        graph.add_node(Arc::clone(&nodes[0])).unwrap();
        let err = graph.add_node(Node::new("A")).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode(_)));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn remove_node_drops_touching_edges() {
        let (graph, nodes) = graph_with(&["A", "B", "C"]);
        graph.add_edge(Edge::new(&nodes[0], &nodes[1])).unwrap();
        graph.add_edge(Edge::new(&nodes[1], &nodes[2])).unwrap();
        graph.add_edge(Edge::new(&nodes[0], &nodes[2])).unwrap();
        graph.remove_node(&nodes[1]).unwrap();
        assert!(!graph.contains_node("B"));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(nodes[0].get_outgoing_edges().len(), 1);
        assert_eq!(nodes[2].get_incoming_edges().len(), 1);
        assert!(nodes[1].get_incoming_edges().is_empty());
        assert!(matches!(
            graph.remove_node(&nodes[1]),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn remove_edge_twice_fails() {
        let (graph, nodes) = graph_with(&["A", "B"]);
        let edge = Edge::new(&nodes[0], &nodes[1]);
        graph.add_edge(edge.clone()).unwrap();
        graph.remove_edge(&edge).unwrap();
        assert!(nodes[0].get_outgoing_edges().is_empty());
        let err = graph.remove_edge(&edge).unwrap_err();
        assert_eq!(err.to_string(), "edge A -> B is not part of the graph");
    }

    #[test]
    fn dispose_cascades_to_nodes() {
        let (graph, nodes) = graph_with(&["A", "B"]);
        graph.add_edge(Edge::new(&nodes[0], &nodes[1])).unwrap();
        graph.dispose();
        graph.dispose();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert!(nodes.iter().all(|node| node.is_disposed()));
        assert!(nodes[0].get_outgoing_edges().is_empty());
    }

    #[test]
    fn layer_failures_collapse_to_single_task_error() {
        let one = vec![TaskExecutionError::panicked(NodeId::from("A"), "boom")];
        assert!(matches!(
            GraphError::from_layer_failures(3, one),
            Some(GraphError::Task(_))
        ));
        assert!(GraphError::from_layer_failures(0, Vec::new()).is_none());
    }
}
