#![allow(missing_docs)]
#![cfg(not(feature = "loom"))]

use anyhow::bail;
use core::num::NonZeroUsize;
use melder::{DirectedAcyclicWorkGraph, Edge, ExecutorConfig, GraphError, Node};
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type Log = Arc<Mutex<Vec<String>>>;

/// Graph over `ids`, wired with `edges` given as index pairs; every node
/// appends its id to the returned log when it runs.
fn build(
    ids: &[&str],
    edges: &[(usize, usize)],
) -> (DirectedAcyclicWorkGraph, Vec<Arc<Node>>, Log) {
    let graph = DirectedAcyclicWorkGraph::new();
    let log = Log::default();
    let nodes: Vec<_> = ids.iter().map(|&id| Node::new(id)).collect();
    for node in &nodes {
        let entry = node.id().to_string();
        let log = Arc::clone(&log);
        node.add_task(move || {
            log.lock().push(entry.clone());
            Ok(())
        });
        graph.add_node(Arc::clone(node)).unwrap();
    }
    for &(from, to) in edges {
        graph.add_edge(Edge::new(&nodes[from], &nodes[to])).unwrap();
    }
    (graph, nodes, log)
}

fn ids(nodes: &[Arc<Node>]) -> Vec<String> {
    nodes.iter().map(|node| node.id().to_string()).collect()
}

fn position(log: &Log, id: &str) -> usize {
    log.lock()
        .iter()
        .position(|entry| entry == id)
        .unwrap_or_else(|| panic!("{id} did not run"))
}

#[test]
fn sorts_a_chain() {
    let (graph, _, _) = build(&["A", "B", "C"], &[(0, 1), (1, 2)]);
    assert_eq!(ids(&graph.topological_sort().unwrap()), ["A", "B", "C"]);
}

#[test]
fn sorts_a_join_last() {
    let (graph, _, _) = build(&["C", "A", "B"], &[(1, 0), (2, 0)]);
    let order = ids(&graph.topological_sort().unwrap());
    assert_eq!(order.last().map(String::as_str), Some("C"));
}

#[test]
fn detects_cycles_lazily() {
    let (graph, _, log) = build(&["A", "B", "free"], &[(0, 1), (1, 0)]);
    let err = graph.topological_sort().unwrap_err();
    let GraphError::CycleDetected { unresolved } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(unresolved, &["A", "B"]);
    assert!(matches!(graph.execute(), Err(GraphError::CycleDetected { .. })));
    assert!(matches!(graph.execute_layered(2), Err(GraphError::CycleDetected { .. })));
    assert!(log.lock().is_empty());
}

#[test]
fn sequential_execution_follows_the_order() {
    init_tracing();
    let (graph, _, log) = build(&["D", "C", "B", "A"], &[(3, 2), (2, 1), (1, 0)]);
    graph.execute().unwrap();
    assert_eq!(*log.lock(), ["A", "B", "C", "D"]);
}

#[test]
fn sequential_execution_fails_fast() {
    let (graph, nodes, log) = build(&["A", "B", "C"], &[(0, 1), (1, 2)]);
    nodes[1].add_task(|| bail!("disk full"));
    let err = graph.execute().unwrap_err();
    let GraphError::Task(failure) = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(failure.node(), "B");
    assert_eq!(*log.lock(), ["A", "B"]);
}

#[test]
fn sequential_execution_reports_panics_as_failures() {
    let (graph, nodes, log) = build(&["A", "B"], &[(0, 1)]);
    nodes[0].add_task(|| panic!("bad state"));
    let err = graph.execute().unwrap_err();
    let GraphError::Task(failure) = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(failure.node(), "A");
    assert!(failure.to_string().contains("bad state"));
    assert_eq!(*log.lock(), ["A"]);
}

#[test]
fn layered_execution_runs_joins_after_their_parents() {
    init_tracing();
    let (graph, nodes, log) = build(&["A", "B", "C"], &[(0, 2), (1, 2)]);
    let parents_done = Arc::new(AtomicUsize::new(0));
    for parent in &nodes[..2] {
        let parents_done = Arc::clone(&parents_done);
        parent.add_task(move || {
            parents_done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    let observed = Arc::clone(&parents_done);
    nodes[2].add_task(move || match observed.load(Ordering::SeqCst) {
        2 => Ok(()),
        seen => bail!("C started after {seen} of 2 parents"),
    });

    graph.execute_layered(2).unwrap();
    assert!(position(&log, "C") > position(&log, "A"));
    assert!(position(&log, "C") > position(&log, "B"));
}

#[test]
fn layered_execution_runs_every_node_once() {
    //   A   B
    //   |\ /|
    //   | C |
    //   |/ \|
    //   D   E
    //    \ /
    //     F
    let (graph, _, log) = build(
        &["A", "B", "C", "D", "E", "F"],
        &[(0, 2), (1, 2), (0, 3), (2, 3), (2, 4), (1, 4), (3, 5), (4, 5)],
    );
    let layers: Vec<_> = graph.layers().unwrap().iter().map(|layer| ids(layer)).collect();
    assert_eq!(layers, [vec!["A", "B"], vec!["C"], vec!["D", "E"], vec!["F"]]);

    graph.execute_layered(3).unwrap();
    let mut ran = log.lock().clone();
    ran.sort();
    assert_eq!(ran, ["A", "B", "C", "D", "E", "F"]);
    assert_eq!(position(&log, "F"), 5);
}

#[test]
fn layer_failures_are_collected_after_the_layer_drains() {
    let (graph, nodes, log) = build(&["A", "B", "C", "D"], &[(0, 3), (1, 3), (2, 3)]);
    nodes[0].add_task(|| bail!("A broke"));
    nodes[1].add_task(|| bail!("B broke"));

    let err = graph.execute_layered(2).unwrap_err();
    let GraphError::Layer { index, failures } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*index, 0);
    let mut failed: Vec<_> = failures.iter().map(|failure| failure.node().to_string()).collect();
    failed.sort();
    assert_eq!(failed, ["A", "B"]);
    assert_eq!(err.task_failures().len(), 2);
    assert!(position(&log, "C") < 3);
    assert!(!log.lock().iter().any(|entry| entry == "D"));
}

#[test]
fn panicking_task_does_not_take_down_siblings() {
    let (graph, nodes, log) = build(&["A", "B"], &[]);
    nodes[0].add_task(|| panic!("index out of range"));

    let err = graph.execute_layered(2).unwrap_err();
    let GraphError::Task(failure) = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(failure.node(), "A");
    assert!(failure.to_string().contains("index out of range"));
    assert!(position(&log, "B") < 2);
}

#[test]
fn workers_are_bounded_and_named() {
    let graph = DirectedAcyclicWorkGraph::new();
    let names = Arc::new(Mutex::new(Vec::new()));
    for idx in 0..6 {
        let node = Node::new(format!("n{idx}"));
        let names = Arc::clone(&names);
        node.add_task(move || {
            let name = std::thread::current().name().map(str::to_owned);
            names.lock().push(name);
            Ok(())
        });
        graph.add_node(node).unwrap();
    }
    let config =
        ExecutorConfig::new(NonZeroUsize::new(2).unwrap()).with_thread_name_prefix("resolver");
    graph.execute_layered_with(&config).unwrap();

    let names = names.lock();
    assert_eq!(names.len(), 6);
    assert!(names.iter().all(|name| {
        matches!(name.as_deref(), Some("resolver-0" | "resolver-1"))
    }));
}

#[test]
fn zero_workers_is_rejected() {
    let (graph, _, log) = build(&["A"], &[]);
    assert!(matches!(graph.execute_layered(0), Err(GraphError::ZeroWorkers)));
    assert!(log.lock().is_empty());
}

#[test]
fn removed_nodes_are_skipped_by_later_layers() {
    let (graph, nodes, log) = build(&["A", "B", "C"], &[(0, 1), (1, 2)]);
    let graph = Arc::new(graph);
    // A prunes B mid-run; the handle is taken so the graph is not kept alive
    // by its own node.
    let pruner = Mutex::new(Some(Arc::clone(&graph)));
    nodes[0].add_task(move || {
        if let Some(graph) = pruner.lock().take() {
            graph.remove_node_by_id("B")?;
        }
        Ok(())
    });

    graph.execute_layered(1).unwrap();
    assert_eq!(*log.lock(), ["A", "C"]);
}

#[test]
fn cycle_added_mid_run_is_reported() {
    let (graph, nodes, log) = build(&["A", "B", "C"], &[(0, 1), (0, 2)]);
    let graph = Arc::new(graph);
    let wiring = Mutex::new(Some((Arc::clone(&graph), nodes[1].clone(), nodes[2].clone())));
    nodes[0].add_task(move || {
        if let Some((graph, b, c)) = wiring.lock().take() {
            graph.add_edge(Edge::new(&b, &c))?;
            graph.add_edge(Edge::new(&c, &b))?;
        }
        Ok(())
    });

    let err = graph.execute_layered(2).unwrap_err();
    let GraphError::CycleDetected { unresolved } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(unresolved, &["B", "C"]);
    assert_eq!(*log.lock(), ["A"]);
}
