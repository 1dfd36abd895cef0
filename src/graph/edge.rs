use crate::graph::Node;
use core::{
    fmt,
    hash::{Hash, Hasher},
};
use std::sync::Arc;

/// Directed dependency `source -> target`: `target` runs after `source`.
///
/// Cloning is cheap and yields the same edge. Equality and hashing are by
/// identity, so two edges built separately over the same endpoints are
/// distinct.
#[derive(Clone)]
pub struct Edge(Arc<EdgeInner>);

struct EdgeInner {
    source: Arc<Node>,
    target: Arc<Node>,
}

impl Edge {
    #[must_use]
    pub fn new(source: &Arc<Node>, target: &Arc<Node>) -> Self {
        Self(Arc::new(EdgeInner {
            source: Arc::clone(source),
            target: Arc::clone(target),
        }))
    }

    #[must_use]
    pub fn source(&self) -> &Arc<Node> {
        &self.0.source
    }

    #[must_use]
    pub fn target(&self) -> &Arc<Node> {
        &self.0.target
    }

    pub(crate) fn touches(&self, node: &Arc<Node>) -> bool {
        Arc::ptr_eq(self.source(), node) || Arc::ptr_eq(self.target(), node)
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Edge {}

impl Hash for Edge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge({} -> {})", self.source().id(), self.target().id())
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn identity_not_endpoints() {
        let a = Node::new("A");
        let b = Node::new("B");
        let edge = Edge::new(&a, &b);
        let twin = Edge::new(&a, &b);
        assert_eq!(edge, edge.clone());
        assert_ne!(edge, twin);
        assert!(edge.touches(&a));
        assert_eq!(format!("{edge:?}"), "Edge(A -> B)");
    }
}
