//! Thread-safe freezable collections and a dependency-graph task executor.
//!
//! The crate has two layers:
//! - `collections`: [`ConcurrentMap`], [`ConcurrentSequence`] and
//!   [`ConcurrentSet`]. Every mutation runs under one exclusive lock, batches
//!   of mutations can be applied atomically, and a container can be frozen
//!   (mutations fail, reads succeed) or disposed (cleared for good).
//! - `graph` and `state`: a [`DirectedAcyclicWorkGraph`] of [`Node`]s, each
//!   holding an ordered list of tasks. The graph detects cycles, sorts
//!   topologically and executes either sequentially or layer by layer on a
//!   bounded worker pool. A [`StateObject`] records per-node outcomes and
//!   prunes failed nodes from the graph while it runs.
//!
//! Quick start:
//! 1. Create nodes with [`Node::new`] and queue closures with
//!    [`Node::add_task`].
//! 2. Register them with [`DirectedAcyclicWorkGraph::add_node`] and wire
//!    dependencies with [`DirectedAcyclicWorkGraph::add_edge`].
//! 3. Call [`DirectedAcyclicWorkGraph::execute`] or
//!    [`DirectedAcyclicWorkGraph::execute_layered`], or bind a
//!    [`StateObject`] and call [`StateObject::execute_layered`] to keep going
//!    past failures.
//!
//! Layered execution guarantees that a node starts only after every node of
//! the previous layers has finished. Within a layer nodes run concurrently in
//! no particular order.

/// Concurrent map, sequence and set with freeze and dispose semantics.
///
/// Mutators report [`ContainerError::Frozen`] on a frozen container and turn
/// into no-ops on a disposed one.
pub mod collections;
/// Worker pool settings for layered execution, including environment
/// overrides.
pub mod config;
/// Work graph: nodes, edges, cycle detection, topological sort and both
/// execution strategies.
pub mod graph;
/// `tracing-subscriber` bootstrap for binaries and examples.
#[cfg(feature = "logging")]
pub mod logging;
/// Per-node outcome tracking and failure pruning.
pub mod state;
mod sync;
/// Task closures, execution contexts and the task failure type.
pub mod task;
/// Node identifiers and the hash-map aliases used across the crate.
pub mod types;
mod utils;

pub use crate::{
    collections::{ConcurrentMap, ConcurrentSequence, ConcurrentSet, ContainerError},
    config::ExecutorConfig,
    graph::{DirectedAcyclicWorkGraph, Edge, GraphError, Node},
    state::{ExecutionReport, NodeStatus, StateObject},
    task::{ExecutionContext, Task, TaskExecutionError},
    types::NodeId,
};
