use crate::{
    graph::{Edge, GraphError, Node},
    types::{HashMap, HashSet, NodeId},
};
use rustc_hash::FxBuildHasher;
use std::{collections::BTreeSet, sync::Arc};

/// Kahn ordering of a graph snapshot.
///
/// `order` and `degree` refer to positions in the snapshot's node list.
/// `degree` is the longest distance from any root, so nodes of equal degree
/// form one layer:
///
/// ```text
///   A     B        degree(A) = degree(B) = 0
///    \   /
///      C           degree(C) = 1 + max(degree(A), degree(B)) = 1
///      |
///      D           degree(D) = 1 + degree(C) = 2
/// ```
pub(super) struct Plan {
    order: Vec<usize>,
    degree: Vec<usize>,
}

impl Plan {
    /// # Errors
    /// [`GraphError::CycleDetected`] naming every node that never became
    /// ready.
    pub(super) fn new(nodes: &[Arc<Node>], edges: &[Edge]) -> Result<Self, GraphError> {
        let position: HashMap<&NodeId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id(), idx))
            .collect();
        let locate = |endpoint: &Arc<Node>| {
            position
                .get(endpoint.id())
                .copied()
                .filter(|&idx| Arc::ptr_eq(&nodes[idx], endpoint))
        };

        let mut children = vec![Vec::new(); nodes.len()];
        let mut parents_left = vec![0usize; nodes.len()];
        for edge in edges {
            // Edges are only ever registered between member nodes; skip
            // anything a concurrent removal left behind in the snapshot.
            let (Some(source), Some(target)) = (locate(edge.source()), locate(edge.target()))
            else {
                continue;
            };
            children[source].push(target);
            parents_left[target] += 1;
        }

        // Positions give a stable tie-break: among ready nodes the earliest
        // inserted goes first.
        let mut ready: BTreeSet<usize> = (0..nodes.len())
            .filter(|&idx| parents_left[idx] == 0)
            .collect();
        let mut order = Vec::with_capacity(nodes.len());
        let mut degree = vec![0usize; nodes.len()];

        while let Some(idx) = ready.pop_first() {
            order.push(idx);
            let child_degree = degree[idx].checked_add(1).expect("Plan::new: [1]");
            for &child in &children[idx] {
                degree[child] = degree[child].max(child_degree);
                let left = &mut parents_left[child];
                *left = left.checked_sub(1).expect("Plan::new: [2]");
                if *left == 0 {
                    let inserted = ready.insert(child);
                    assert!(inserted, "Plan::new: [3]");
                }
            }
        }

        if order.len() != nodes.len() {
            let unresolved = nodes
                .iter()
                .zip(&parents_left)
                .filter(|&(_, &left)| left > 0)
                .map(|(node, _)| node.id().clone())
                .collect();
            return Err(GraphError::CycleDetected { unresolved });
        }
        Ok(Self { order, degree })
    }

    pub(super) fn order(&self, nodes: &[Arc<Node>]) -> Vec<Arc<Node>> {
        self.order.iter().map(|&idx| Arc::clone(&nodes[idx])).collect()
    }

    /// Nodes grouped by degree, each layer in insertion order.
    pub(super) fn layers(&self, nodes: &[Arc<Node>]) -> Vec<Vec<Arc<Node>>> {
        let depth = self.degree.iter().max().map_or(0, |&max| max + 1);
        let mut layers = vec![Vec::new(); depth];
        for (node, &degree) in nodes.iter().zip(&self.degree) {
            layers[degree].push(Arc::clone(node));
        }
        layers
    }
}

/// Nodes of the live snapshot that are not `done` and whose every incoming
/// edge starts at a `done` node.
///
/// Nodes pruned from the graph take their edges with them, so their
/// dependants become ready without them.
pub(super) fn next_layer(
    nodes: &[Arc<Node>],
    edges: &[Edge],
    done: &HashSet<NodeId>,
) -> Vec<Arc<Node>> {
    let mut blocked = HashSet::with_capacity_and_hasher(edges.len(), FxBuildHasher);
    for edge in edges {
        if !done.contains(edge.source().id()) {
            blocked.insert(edge.target().id());
        }
    }
    nodes
        .iter()
        .filter(|node| !done.contains(node.id()) && !blocked.contains(node.id()))
        .cloned()
        .collect()
}
