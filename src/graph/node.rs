use crate::{
    collections::{ConcurrentSequence, ConcurrentSet},
    graph::Edge,
    sync::{AtomicBool, Ordering, RwLock},
    task::{ExecutionContext, Task, TaskExecutionError},
    types::NodeId,
};
use core::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Vertex of a work graph.
///
/// Owns an ordered list of tasks, an optional [`ExecutionContext`] and its
/// adjacency. Adjacency is maintained by the owning
/// [`DirectedAcyclicWorkGraph`](crate::graph::DirectedAcyclicWorkGraph).
pub struct Node {
    id: NodeId,
    tasks: ConcurrentSequence<Task>,
    context: RwLock<Option<Arc<dyn ExecutionContext>>>,
    incoming: ConcurrentSet<Edge>,
    outgoing: ConcurrentSet<Edge>,
    disposed: AtomicBool,
}

impl Node {
    #[must_use]
    pub fn new(id: impl Into<NodeId>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            tasks: ConcurrentSequence::new(),
            context: RwLock::new(None),
            incoming: ConcurrentSet::new(),
            outgoing: ConcurrentSet::new(),
            disposed: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Queue `task` after the already queued ones. No-op once disposed.
    pub fn add_task<F>(&self, task: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.tasks
            .push(Arc::new(task))
            .expect("Node::add_task: [1]");
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Attach `context`, replacing any previous one.
    pub fn set_execution_context(&self, context: Arc<dyn ExecutionContext>) {
        if self.is_disposed() {
            return;
        }
        *self.context.write() = Some(context);
    }

    pub fn execution_context(&self) -> Option<Arc<dyn ExecutionContext>> {
        self.context.read().clone()
    }

    /// Run every queued task in order, then the execution context.
    ///
    /// The task list is snapshotted first, so tasks may queue further tasks
    /// on this node without deadlocking; those run on the next call.
    ///
    /// # Errors
    /// The first failure, which halts the remaining tasks.
    pub fn execute_tasks(&self) -> Result<(), TaskExecutionError> {
        let tasks = self.tasks.to_vec();
        trace!(node = %self.id, tasks = tasks.len(), "executing");
        for task in tasks {
            task().map_err(|cause| TaskExecutionError::new(self.id.clone(), cause))?;
        }
        if let Some(context) = self.execution_context() {
            context
                .execute()
                .map_err(|cause| TaskExecutionError::new(self.id.clone(), cause))?;
        }
        Ok(())
    }

    pub fn get_incoming_edges(&self) -> Vec<Edge> {
        self.incoming.to_vec()
    }

    pub fn get_outgoing_edges(&self) -> Vec<Edge> {
        self.outgoing.to_vec()
    }

    pub(crate) fn link_incoming(&self, edge: Edge) {
        self.incoming
            .insert(edge)
            .expect("Node::link_incoming: [1]");
    }

    pub(crate) fn link_outgoing(&self, edge: Edge) {
        self.outgoing
            .insert(edge)
            .expect("Node::link_outgoing: [1]");
    }

    pub(crate) fn unlink(&self, edge: &Edge) {
        self.incoming.discard(edge).expect("Node::unlink: [1]");
        self.outgoing.discard(edge).expect("Node::unlink: [2]");
    }

    /// Drop the tasks, the adjacency and the execution context.
    ///
    /// Does not touch the graph's own collections. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.tasks.dispose();
        self.incoming.dispose();
        self.outgoing.dispose();
        let context = self.context.write().take();
        if let Some(context) = context {
            context.dispose();
        }
        debug!(node = %self.id, "node disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("tasks", &self.tasks.len())
            .field("incoming", &self.incoming.len())
            .field("outgoing", &self.outgoing.len())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use anyhow::bail;
    use parking_lot::Mutex;

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl ExecutionContext for Recorder {
        fn execute(&self) -> anyhow::Result<()> {
            self.0.lock().push("context".to_owned());
            Ok(())
        }
    }

    #[test]
    fn tasks_run_in_order_then_context() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let node = Node::new("A");
        for name in ["first", "second"] {
            let log = Arc::clone(&log);
            node.add_task(move || {
                log.lock().push(name.to_owned());
                Ok(())
            });
        }
        node.set_execution_context(Arc::new(Recorder(Arc::clone(&log))));
        node.execute_tasks().unwrap();
        assert_eq!(*log.lock(), ["first", "second", "context"]);
    }

    #[test]
    fn failure_halts_remaining_tasks() {
        let ran = Arc::new(AtomicBool::new(false));
        let node = Node::new("A");
        node.add_task(|| bail!("boom"));
        let flag = Arc::clone(&ran);
        node.add_task(move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        let err = node.execute_tasks().unwrap_err();
        assert_eq!(err.node(), "A");
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn dispose_is_idempotent() {
        let node = Node::new("A");
        node.add_task(|| Ok(()));
        node.dispose();
        node.dispose();
        assert!(node.is_disposed());
        assert_eq!(node.task_count(), 0);
        node.add_task(|| Ok(()));
        assert_eq!(node.task_count(), 0);
    }
}
