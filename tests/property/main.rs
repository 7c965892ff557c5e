// tests/property/main.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use proptest::prelude::*;
use taskdag::dag::{TaskGraph, TaskFn};
use taskdag::engine::{Scheduler, SchedulerConfig, SchedulerObserver, Transition};
use taskdag::errors::GraphError;
use taskdag_test_utils::actions;
use taskdag_test_utils::recorder::RecordingObserver;

/// A random DAG: task `i` may only depend on tasks `0..i`, which keeps it
/// acyclic. Tasks are registered in `order`, so dependents are often added
/// before their prerequisites.
#[derive(Debug, Clone)]
struct DagCase {
    deps: Vec<BTreeSet<usize>>,
    order: Vec<usize>,
}

fn name(i: usize) -> String {
    format!("task_{i:02}")
}

fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = DagCase> {
    (1..=max_tasks).prop_flat_map(|n| {
        let deps = proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n);
        let order = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        (deps, order).prop_map(|(raw, order)| {
            let deps = raw
                .into_iter()
                .enumerate()
                .map(|(i, picks)| {
                    if i == 0 {
                        BTreeSet::new()
                    } else {
                        picks.into_iter().map(|p| p % i).collect()
                    }
                })
                .collect();
            DagCase { deps, order }
        })
    })
}

impl DagCase {
    fn build(&self, mut action_for: impl FnMut(usize) -> TaskFn) -> TaskGraph {
        let mut graph = TaskGraph::new();
        for &i in &self.order {
            graph
                .add_task(name(i), action_for(i), self.deps[i].iter().map(|&d| name(d)))
                .unwrap();
        }
        graph
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn orderings_respect_every_edge(case in dag_strategy(12)) {
        let graph = case.build(|_| actions::ok());
        prop_assert!(graph.validate().is_ok());

        let order = graph.topological_order().unwrap();
        prop_assert_eq!(order.len(), case.deps.len());
        let position: BTreeMap<&str, usize> =
            order.iter().enumerate().map(|(p, id)| (id.as_str(), p)).collect();
        for (i, deps) in case.deps.iter().enumerate() {
            for &d in deps {
                prop_assert!(position[name(d).as_str()] < position[name(i).as_str()]);
            }
        }

        let groups = graph.parallelism_groups().unwrap();
        prop_assert_eq!(&groups, &graph.parallelism_groups().unwrap());
        let mut level = BTreeMap::new();
        for (l, group) in groups.iter().enumerate() {
            let mut sorted = group.clone();
            sorted.sort();
            prop_assert_eq!(&sorted, group);
            for id in group {
                level.insert(id.clone(), l);
            }
        }
        prop_assert_eq!(level.len(), case.deps.len());
        for (i, deps) in case.deps.iter().enumerate() {
            for &d in deps {
                prop_assert!(level[&name(d)] < level[&name(i)]);
            }
        }
    }

    #[test]
    fn back_edges_are_rejected_and_leave_graph_intact(case in dag_strategy(12)) {
        let mut graph = case.build(|_| actions::ok());
        let before = graph.topological_order().unwrap();

        // Any edge from a task to one of its (transitive) prerequisites closes a cycle.
        for (i, deps) in case.deps.iter().enumerate() {
            for &d in deps {
                let err = graph.add_dependency(&name(i), &name(d)).unwrap_err();
                prop_assert!(matches!(err, GraphError::Cycle { .. }), "{:?}", err);
            }
        }
        prop_assert_eq!(before, graph.topological_order().unwrap());
    }

    #[test]
    fn every_task_runs_once_after_its_prerequisites(
        case in dag_strategy(12),
        pool_size in 1usize..6,
        failing in proptest::collection::btree_set(0usize..12, 0..4),
    ) {
        let graph = case.build(|i| {
            if failing.contains(&i) { actions::failing("planned failure") } else { actions::ok() }
        });

        let recorder = Arc::new(RecordingObserver::new());
        let observer: Arc<dyn SchedulerObserver> = recorder.clone();
        let scheduler = Scheduler::new(SchedulerConfig::default().with_pool_size(pool_size))
            .with_observer(observer);

        let report = runtime().block_on(async {
            tokio::time::timeout(std::time::Duration::from_secs(10), scheduler.run(&graph)).await
        });
        let report = report.expect("run timed out").expect("run failed");

        // Best effort: every task runs, failures only mark themselves.
        prop_assert_eq!(report.total(), case.deps.len());
        let expected_failed: BTreeSet<String> = failing
            .iter()
            .filter(|&&i| i < case.deps.len())
            .map(|&i| name(i))
            .collect();
        let failed: BTreeSet<String> = report.failed.keys().cloned().collect();
        prop_assert_eq!(failed, expected_failed);

        for (i, deps) in case.deps.iter().enumerate() {
            let id = name(i);
            prop_assert_eq!(recorder.count(&id, Transition::Ready), 1);
            prop_assert_eq!(recorder.count(&id, Transition::Running), 1);

            // Both stamps are taken under the run's counter lock, and a
            // dependent is only pushed in the critical section that stamps its
            // last prerequisite's finish, so `<=` is the strongest order an
            // `Instant` can show.
            let started = report.timings[&id].started;
            for &d in deps {
                prop_assert!(report.timings[&name(d)].finished <= started);
            }
        }
    }
}
