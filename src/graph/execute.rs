use crate::{
    config::ExecutorConfig,
    graph::{DirectedAcyclicWorkGraph, GraphError, Node, sort},
    sync::{LayerSlots, join},
    task::TaskExecutionError,
    types::{HashSet, NodeId},
    utils::{RangeSplitAtHalf, catch_panic},
};
use core::{num::NonZeroUsize, ops::Range};
use std::sync::Arc;
use tracing::{debug_span, info, warn};

/// Outcome of one node within a layer.
pub(crate) type NodeOutcome = (NodeId, Result<(), TaskExecutionError>);

impl DirectedAcyclicWorkGraph {
    /// Every node such that each edge's source precedes its target; ties
    /// are broken by insertion order.
    ///
    /// # Errors
    /// [`GraphError::CycleDetected`] if no such order exists.
    pub fn topological_sort(&self) -> Result<Vec<Arc<Node>>, GraphError> {
        let (nodes, edges) = self.snapshot();
        Ok(sort::Plan::new(&nodes, &edges)?.order(&nodes))
    }

    /// Breadth-first layers: every node lands one layer after its deepest
    /// prerequisite.
    ///
    /// # Errors
    /// [`GraphError::CycleDetected`] if the graph is cyclic.
    pub fn layers(&self) -> Result<Vec<Vec<Arc<Node>>>, GraphError> {
        let (nodes, edges) = self.snapshot();
        Ok(sort::Plan::new(&nodes, &edges)?.layers(&nodes))
    }

    /// Run every node on the calling thread in topological order. A panicking
    /// task is reported as that node's failure.
    ///
    /// # Errors
    /// The cycle, or the first failing node; nothing after it runs.
    pub fn execute(&self) -> Result<(), GraphError> {
        let order = self.topological_sort()?;
        info!(nodes = order.len(), "sequential execution started");
        for node in &order {
            let (_, outcome) = run_node(node);
            outcome.inspect_err(|err| warn!(%err, "node failed"))?;
        }
        info!(nodes = order.len(), "sequential execution finished");
        Ok(())
    }

    /// [`Self::execute_layered_with`] on `max_workers` workers.
    ///
    /// # Errors
    /// [`GraphError::ZeroWorkers`] if `max_workers` is zero, otherwise as
    /// [`Self::execute_layered_with`].
    pub fn execute_layered(&self, max_workers: usize) -> Result<(), GraphError> {
        let max_workers = NonZeroUsize::new(max_workers).ok_or(GraphError::ZeroWorkers)?;
        self.execute_layered_with(&ExecutorConfig::new(max_workers))
    }

    /// Run the graph layer by layer on a bounded worker pool.
    ///
    /// Each layer is drained before the next one is computed from the live
    /// graph, so nodes removed in between are skipped. A failing or
    /// panicking node does not stop its siblings; the layer's failures are
    /// returned once it drains and later layers do not run.
    ///
    /// # Errors
    /// The cycle (including one added by a task mid-run), a worker pool
    /// failure, [`GraphError::Task`] for a single failure or
    /// [`GraphError::Layer`] for several.
    pub fn execute_layered_with(&self, config: &ExecutorConfig) -> Result<(), GraphError> {
        self.run_layers(config, |index, outcomes| {
            let failures = outcomes
                .into_iter()
                .filter_map(|(_, outcome)| outcome.err())
                .collect();
            GraphError::from_layer_failures(index, failures).map_or(Ok(()), Err)
        })
    }

    /// Dispatch layers until no node is left, handing each drained layer to
    /// `on_layer`. An `Err` from `on_layer` stops the run, as does a cycle
    /// introduced while the graph runs.
    pub(crate) fn run_layers(
        &self,
        config: &ExecutorConfig,
        mut on_layer: impl FnMut(usize, Vec<NodeOutcome>) -> Result<(), GraphError>,
    ) -> Result<(), GraphError> {
        {
            let (nodes, edges) = self.snapshot();
            sort::Plan::new(&nodes, &edges)?;
        }
        let dispatcher = Dispatcher::new(config)?;
        info!(
            max_workers = config.max_workers().get(),
            "layered execution started"
        );

        let mut done = HashSet::default();
        let mut index = 0usize;
        loop {
            let (nodes, edges) = self.snapshot();
            let layer = sort::next_layer(&nodes, &edges, &done);
            if layer.is_empty() {
                let unresolved: Vec<_> = nodes
                    .iter()
                    .filter(|node| !done.contains(node.id()))
                    .map(|node| node.id().clone())
                    .collect();
                if unresolved.is_empty() {
                    break;
                }
                warn!(stalled = unresolved.len(), "graph became cyclic mid-run");
                return Err(GraphError::CycleDetected { unresolved });
            }
            done.extend(layer.iter().map(|node| node.id().clone()));
            let span = debug_span!("layer", index, nodes = layer.len());
            let outcomes = span.in_scope(|| dispatcher.run(layer));
            for (node, outcome) in &outcomes {
                if let Err(err) = outcome {
                    warn!(%node, %err, "node failed");
                }
            }
            on_layer(index, outcomes)?;
            index = index.checked_add(1).expect("DirectedAcyclicWorkGraph::run_layers: [1]");
        }
        info!(layers = index, "layered execution finished");
        Ok(())
    }
}

struct Dispatcher {
    #[cfg(not(feature = "loom"))]
    pool: rayon::ThreadPool,
}

impl Dispatcher {
    #[cfg(not(feature = "loom"))]
    fn new(config: &ExecutorConfig) -> Result<Self, GraphError> {
        let prefix = config.thread_name_prefix().to_owned();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_workers().get())
            .thread_name(move |idx| format!("{prefix}-{idx}"))
            .build()?;
        Ok(Self { pool })
    }

    /// Every `join` spawns a `loom` thread; the worker bound is not modelled.
    #[cfg(feature = "loom")]
    #[allow(clippy::unnecessary_wraps)]
    fn new(_config: &ExecutorConfig) -> Result<Self, GraphError> {
        Ok(Self {})
    }

    /// Run `layer` to completion; outcomes keep the layer's order.
    #[cfg(not(feature = "loom"))]
    fn run(&self, layer: Vec<Arc<Node>>) -> Vec<NodeOutcome> {
        let range = 0..layer.len();
        self.pool.install(|| join_layer(&layer, range))
    }

    #[cfg(feature = "loom")]
    fn run(&self, layer: Vec<Arc<Node>>) -> Vec<NodeOutcome> {
        let range = 0..layer.len();
        join_layer(Arc::from(layer), range)
    }
}

fn join_layer(slots: LayerSlots<'_>, range: Range<usize>) -> Vec<NodeOutcome> {
    match range.len() {
        0 => return Vec::new(),
        1 => return vec![run_node(&slots[range.start])],
        _ => {}
    }
    let (left_range, right_range) = range.split_at_half();
    // Copies the slice reference, or bumps the `Arc` under `loom`.
    #[allow(noop_method_call)]
    let rhs_slots = slots.clone();
    let (mut outcomes, rhs) = join(
        move || join_layer(slots, left_range),
        move || join_layer(rhs_slots, right_range),
    );
    outcomes.extend(rhs);
    outcomes
}

fn run_node(node: &Node) -> NodeOutcome {
    let span = debug_span!("node", id = %node.id());
    let _entered = span.enter();
    let outcome = catch_panic(|| node.execute_tasks()).unwrap_or_else(|message| {
        Err(TaskExecutionError::panicked(node.id().clone(), &message))
    });
    (node.id().clone(), outcome)
}
