// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};
use std::fmt;

use petgraph::Direction::{Incoming, Outgoing};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use tracing::debug;

use crate::dag::task::TaskFn;
use crate::errors::GraphError;
use crate::types::TaskId;

/// Arena slot: a task plus the ids it declared as prerequisites.
#[derive(Clone)]
struct TaskNode {
    id: TaskId,
    action: TaskFn,
    /// Everything this task waits for, including ids not registered yet.
    dependencies: BTreeSet<TaskId>,
}

/// Flattened view of one task handed to the scheduler at run start.
pub(crate) struct ArenaEntry {
    pub(crate) id: TaskId,
    pub(crate) action: TaskFn,
    pub(crate) dependents: Vec<usize>,
    pub(crate) prerequisites: usize,
}

/// Dependency graph of tasks.
///
/// Tasks are stored in an append-only arena (a petgraph `DiGraph`, whose
/// node indices never move because nothing is ever removed). An edge
/// `a -> b` means "`b` waits for `a`".
///
/// Edges are checked for cycles as they are inserted, so a graph can never
/// hold a cycle. `add_task` may name dependencies that are not registered
/// yet; those references are parked and wired up (with the same cycle check)
/// when the missing task is added. Anything still dangling when the graph is
/// consumed is reported as [`GraphError::UnknownDependency`].
#[derive(Clone, Default)]
pub struct TaskGraph {
    graph: DiGraph<TaskNode, ()>,
    index: HashMap<TaskId, NodeIndex>,
    /// Missing id -> tasks that are waiting for it to be registered.
    unresolved: BTreeMap<TaskId, BTreeSet<TaskId>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task and its prerequisites.
    ///
    /// Fails without modifying the graph if `id` is already registered or if
    /// wiring the task in would close a cycle.
    pub fn add_task<I, S>(
        &mut self,
        id: impl Into<TaskId>,
        action: TaskFn,
        dependencies: I,
    ) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateTask(id));
        }

        let dependencies: BTreeSet<TaskId> = dependencies.into_iter().map(Into::into).collect();
        if dependencies.contains(&id) {
            return Err(GraphError::Cycle {
                from: id.clone(),
                to: id,
            });
        }

        let known: Vec<NodeIndex> = dependencies
            .iter()
            .filter_map(|dep| self.index.get(dep).copied())
            .collect();
        let waiting: Vec<NodeIndex> = self
            .unresolved
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|name| self.index.get(name).copied())
            .collect();

        // New edges are `known -> id` and `id -> waiting`; they close a cycle
        // exactly when some waiting task already reaches a known dependency.
        if let Some(hit) = self.first_reachable(&waiting, &known) {
            return Err(GraphError::Cycle {
                from: self.graph[hit].id.clone(),
                to: id,
            });
        }

        let node = self.graph.add_node(TaskNode {
            id: id.clone(),
            action,
            dependencies: dependencies.clone(),
        });
        self.index.insert(id.clone(), node);

        for dep in known {
            self.graph.add_edge(dep, node, ());
        }
        for dependent in waiting {
            self.graph.add_edge(node, dependent, ());
        }
        self.unresolved.remove(&id);

        for dep in dependencies.iter().filter(|d| !self.index.contains_key(*d)) {
            debug!(task = %id, dependency = %dep, "dependency not registered yet; deferring edge");
            self.unresolved
                .entry(dep.clone())
                .or_default()
                .insert(id.clone());
        }

        debug!(task = %id, deps = dependencies.len(), "task registered");
        Ok(())
    }

    /// Make `to` wait for `from`.
    ///
    /// Both tasks must already be registered. Adding an edge that already
    /// exists is a no-op.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let to_ix = *self
            .index
            .get(to)
            .ok_or_else(|| GraphError::UnknownTask(to.to_string()))?;
        let from_ix = *self
            .index
            .get(from)
            .ok_or_else(|| GraphError::UnknownDependency {
                task: to.to_string(),
                dependency: from.to_string(),
            })?;

        let would_cycle = || GraphError::Cycle {
            from: from.to_string(),
            to: to.to_string(),
        };

        if from_ix == to_ix {
            return Err(would_cycle());
        }
        if self.graph.find_edge(from_ix, to_ix).is_some() {
            return Ok(());
        }
        if self.first_reachable(&[to_ix], &[from_ix]).is_some() {
            return Err(would_cycle());
        }

        self.graph.add_edge(from_ix, to_ix, ());
        self.graph[to_ix].dependencies.insert(from.to_string());
        debug!(from = %from, to = %to, "dependency added");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Task ids in registration order.
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(|n| n.id.as_str())
    }

    /// Declared prerequisites of a task (including unresolved ones).
    pub fn dependencies_of(&self, id: &str) -> Option<&BTreeSet<TaskId>> {
        self.index.get(id).map(|&ix| &self.graph[ix].dependencies)
    }

    /// Tasks that list `id` as a prerequisite, sorted.
    pub fn dependents_of(&self, id: &str) -> Vec<TaskId> {
        let Some(&ix) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<TaskId> = self
            .graph
            .neighbors_directed(ix, Outgoing)
            .map(|n| self.graph[n].id.clone())
            .collect();
        out.sort();
        out
    }

    /// Dependency ids that were referenced but never registered, with the
    /// tasks referencing them.
    pub fn unresolved_dependencies(&self) -> &BTreeMap<TaskId, BTreeSet<TaskId>> {
        &self.unresolved
    }

    /// Check that the graph can be executed: every reference resolved and no
    /// cycle.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.topological_order().map(|_| ())
    }

    /// Kahn's algorithm; ties broken lexicographically so the output is
    /// reproducible.
    pub fn topological_order(&self) -> Result<Vec<TaskId>, GraphError> {
        self.ensure_resolved()?;

        let mut in_degree = self.in_degrees();
        let mut heap: BinaryHeap<Reverse<(&str, NodeIndex)>> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .map(|n| Reverse((self.graph[n].id.as_str(), n)))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse((id, node))) = heap.pop() {
            order.push(id.to_string());
            for succ in self.graph.neighbors_directed(node, Outgoing) {
                let deg = &mut in_degree[succ.index()];
                *deg -= 1;
                if *deg == 0 {
                    heap.push(Reverse((self.graph[succ].id.as_str(), succ)));
                }
            }
        }

        if order.len() < self.len() {
            return Err(self.leftover_cycle(&in_degree));
        }
        Ok(order)
    }

    /// Level-ordered grouping: group `k` holds every task whose
    /// prerequisites all sit in groups `< k`. Ids within a group are sorted.
    pub fn parallelism_groups(&self) -> Result<Vec<Vec<TaskId>>, GraphError> {
        self.ensure_resolved()?;

        let mut in_degree = self.in_degrees();
        let mut frontier: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .collect();

        let mut groups = Vec::new();
        let mut seen = 0;
        while !frontier.is_empty() {
            seen += frontier.len();

            let mut next = Vec::new();
            for &node in &frontier {
                for succ in self.graph.neighbors_directed(node, Outgoing) {
                    let deg = &mut in_degree[succ.index()];
                    *deg -= 1;
                    if *deg == 0 {
                        next.push(succ);
                    }
                }
            }

            let mut group: Vec<TaskId> = frontier
                .iter()
                .map(|&n| self.graph[n].id.clone())
                .collect();
            group.sort();
            groups.push(group);
            frontier = next;
        }

        if seen < self.len() {
            return Err(self.leftover_cycle(&in_degree));
        }
        Ok(groups)
    }

    /// Tasks not in `completed` whose prerequisites are all in `completed`,
    /// sorted.
    pub fn ready_tasks(&self, completed: &BTreeSet<TaskId>) -> Vec<TaskId> {
        let mut ready: Vec<TaskId> = self
            .graph
            .node_weights()
            .filter(|n| !completed.contains(&n.id))
            .filter(|n| n.dependencies.is_subset(completed))
            .map(|n| n.id.clone())
            .collect();
        ready.sort();
        ready
    }

    /// Build a new graph with `roots` and everything downstream of them.
    ///
    /// Prerequisites outside that set are dropped, i.e. treated as already
    /// satisfied. Handy for re-submitting the failed part of a run.
    pub fn subgraph_from<I, S>(&self, roots: I) -> Result<TaskGraph, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dfs = Dfs::empty(&self.graph);
        let mut keep = BTreeSet::new();
        for root in roots {
            let root = root.as_ref();
            let &ix = self
                .index
                .get(root)
                .ok_or_else(|| GraphError::UnknownTask(root.to_string()))?;
            dfs.move_to(ix);
            while let Some(n) = dfs.next(&self.graph) {
                keep.insert(n);
            }
        }

        let mut sub = TaskGraph::new();
        for &ix in &keep {
            let node = &self.graph[ix];
            let deps = self
                .graph
                .neighbors_directed(ix, Incoming)
                .filter(|d| keep.contains(d))
                .map(|d| self.graph[d].id.clone());
            sub.add_task(node.id.clone(), node.action.clone(), deps)?;
        }
        Ok(sub)
    }

    /// Flatten the arena for a run. Indices match node indices.
    pub(crate) fn arena_entries(&self) -> Vec<ArenaEntry> {
        self.graph
            .node_indices()
            .map(|n| ArenaEntry {
                id: self.graph[n].id.clone(),
                action: self.graph[n].action.clone(),
                dependents: self
                    .graph
                    .neighbors_directed(n, Outgoing)
                    .map(|d| d.index())
                    .collect(),
                prerequisites: self.graph.neighbors_directed(n, Incoming).count(),
            })
            .collect()
    }

    fn ensure_resolved(&self) -> Result<(), GraphError> {
        match self.unresolved.iter().next() {
            Some((missing, waiting)) => Err(GraphError::UnknownDependency {
                task: waiting.iter().next().cloned().unwrap_or_default(),
                dependency: missing.clone(),
            }),
            None => Ok(()),
        }
    }

    fn in_degrees(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Incoming).count())
            .collect()
    }

    fn leftover_cycle(&self, in_degree: &[usize]) -> GraphError {
        let mut stuck: Vec<TaskId> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] > 0)
            .map(|n| self.graph[n].id.clone())
            .collect();
        stuck.sort();
        GraphError::CycleDetected(stuck)
    }

    /// First node of `targets` reachable (along dependency edges) from any
    /// node in `starts`. Starts count as reachable from themselves.
    fn first_reachable(&self, starts: &[NodeIndex], targets: &[NodeIndex]) -> Option<NodeIndex> {
        if starts.is_empty() || targets.is_empty() {
            return None;
        }
        let mut dfs = Dfs::empty(&self.graph);
        for &start in starts {
            dfs.move_to(start);
            while let Some(n) = dfs.next(&self.graph) {
                if targets.contains(&n) {
                    return Some(n);
                }
            }
        }
        None
    }
}

// Pretty-print without touching actions.
impl fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tasks: BTreeMap<&str, &BTreeSet<TaskId>> = self
            .graph
            .node_weights()
            .map(|n| (n.id.as_str(), &n.dependencies))
            .collect();
        f.debug_struct("TaskGraph")
            .field("tasks", &tasks)
            .field("unresolved", &self.unresolved)
            .finish()
    }
}
