//! Dependency graph for tasks
//!
//! Stores "depends-on" edges as an adjacency map with a reverse index for
//! dependents. Acyclicity is enforced at insertion: a new edge is rejected if
//! its target can already reach its source. Neighbour lists keep edge
//! insertion order, which makes every traversal deterministic.
//!
//! Topological ordering is delegated to petgraph.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, trace};

use super::id::TaskId;

/// Default ceiling for traversal depth
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default cap on the number of entries a dependency chain may produce
pub const DEFAULT_MAX_CHAIN_ENTRIES: usize = 100_000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("Adding dependency would create a cycle: {0} -> {1}")]
    CycleDetected(TaskId, TaskId),

    #[error("Self-dependency not allowed: {0}")]
    SelfDependency(TaskId),

    #[error("Dependency graph below {task} is deeper than the limit of {limit}")]
    TooDeep { task: TaskId, limit: usize },

    #[error("Dependency chain of {task} exceeds {limit} entries")]
    ChainTooLarge { task: TaskId, limit: usize },
}

/// A directed edge: `task` depends on `depends_on`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub task: TaskId,
    pub depends_on: TaskId,
}

impl DependencyEdge {
    pub fn new(task: TaskId, depends_on: TaskId) -> Self {
        Self { task, depends_on }
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    /// Tasks this node depends on, in edge insertion order
    depends_on: Vec<TaskId>,
    /// Tasks depending on this node, in edge insertion order
    dependents: Vec<TaskId>,
}

/// A dependency graph for tasks
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<TaskId, Node>,

    /// Node registration order
    order: Vec<TaskId>,

    /// Every edge, in insertion order
    edge_log: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from edges, validating each one in order
    pub fn from_edges<'a>(
        edges: impl IntoIterator<Item = &'a DependencyEdge>,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_dependency(&edge.task, &edge.depends_on)?;
        }
        Ok(graph)
    }

    /// Registers a task without any edges
    pub fn add_task(&mut self, task_id: TaskId) {
        if !self.nodes.contains_key(&task_id) {
            self.order.push(task_id.clone());
            self.nodes.insert(task_id, Node::default());
        }
    }

    /// Removes a task and every edge touching it
    pub fn remove_task(&mut self, task_id: &TaskId) -> bool {
        let Some(node) = self.nodes.remove(task_id) else {
            return false;
        };

        for dep in &node.depends_on {
            if let Some(n) = self.nodes.get_mut(dep) {
                n.dependents.retain(|id| id != task_id);
            }
        }
        for dependent in &node.dependents {
            if let Some(n) = self.nodes.get_mut(dependent) {
                n.depends_on.retain(|id| id != task_id);
            }
        }

        self.edge_log
            .retain(|e| &e.task != task_id && &e.depends_on != task_id);
        self.order.retain(|id| id != task_id);
        debug!(task = %task_id, "removed task from dependency graph");
        true
    }

    /// Checks whether `task -> depends_on` may be inserted
    ///
    /// Returns `Ok(false)` when the edge already exists.
    pub fn validate_dependency(
        &self,
        task: &TaskId,
        depends_on: &TaskId,
    ) -> Result<bool, GraphError> {
        if task == depends_on {
            return Err(GraphError::SelfDependency(task.clone()));
        }
        if self.has_dependency(task, depends_on) {
            return Ok(false);
        }
        if self.reaches(depends_on, task) {
            return Err(GraphError::CycleDetected(task.clone(), depends_on.clone()));
        }
        Ok(true)
    }

    /// Adds a dependency edge: `task` depends on `depends_on`
    ///
    /// Either the edge is inserted or the graph is left untouched.
    pub fn add_dependency(&mut self, task: &TaskId, depends_on: &TaskId) -> Result<(), GraphError> {
        match self.validate_dependency(task, depends_on) {
            Ok(true) => {
                self.insert_unchecked(task, depends_on);
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                debug!(%task, %depends_on, error = %e, "rejected dependency");
                Err(e)
            }
        }
    }

    fn insert_unchecked(&mut self, task: &TaskId, depends_on: &TaskId) {
        self.add_task(task.clone());
        self.add_task(depends_on.clone());

        if let Some(node) = self.nodes.get_mut(task) {
            node.depends_on.push(depends_on.clone());
        }
        if let Some(node) = self.nodes.get_mut(depends_on) {
            node.dependents.push(task.clone());
        }
        self.edge_log
            .push(DependencyEdge::new(task.clone(), depends_on.clone()));
        trace!(%task, %depends_on, "inserted dependency");
    }

    /// Removes a dependency edge
    pub fn remove_dependency(&mut self, task: &TaskId, depends_on: &TaskId) -> bool {
        let removed = match self.nodes.get_mut(task) {
            Some(node) => {
                let before = node.depends_on.len();
                node.depends_on.retain(|id| id != depends_on);
                node.depends_on.len() != before
            }
            None => false,
        };

        if removed {
            if let Some(node) = self.nodes.get_mut(depends_on) {
                node.dependents.retain(|id| id != task);
            }
            self.edge_log
                .retain(|e| !(&e.task == task && &e.depends_on == depends_on));
        }
        removed
    }

    /// Returns true if `task` directly depends on `depends_on`
    pub fn has_dependency(&self, task: &TaskId, depends_on: &TaskId) -> bool {
        self.nodes
            .get(task)
            .is_some_and(|n| n.depends_on.contains(depends_on))
    }

    /// Returns true if adding `task -> depends_on` would be rejected
    pub fn would_create_cycle(&self, task: &TaskId, depends_on: &TaskId) -> bool {
        task == depends_on || self.reaches(depends_on, task)
    }

    /// Depth-first reachability from `from` to `target` along depends-on edges
    fn reaches(&self, from: &TaskId, target: &TaskId) -> bool {
        let mut visited: HashSet<&TaskId> = HashSet::new();
        let mut stack: Vec<&TaskId> = vec![from];

        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            // Reversed so the first inserted edge is explored first
            for dep in self.dependency_slice(current).iter().rev() {
                if !visited.contains(dep) {
                    stack.push(dep);
                }
            }
        }

        false
    }

    pub(crate) fn dependency_slice(&self, task_id: &TaskId) -> &[TaskId] {
        self.nodes
            .get(task_id)
            .map(|n| n.depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the direct dependencies of a task
    pub fn dependencies(&self, task_id: &TaskId) -> Vec<TaskId> {
        self.dependency_slice(task_id).to_vec()
    }

    /// Returns the direct dependents of a task (tasks that depend on it)
    pub fn dependents(&self, task_id: &TaskId) -> Vec<TaskId> {
        self.nodes
            .get(task_id)
            .map(|n| n.dependents.clone())
            .unwrap_or_default()
    }

    /// Returns the number of direct dependents
    pub fn dependent_count(&self, task_id: &TaskId) -> usize {
        self.nodes.get(task_id).map_or(0, |n| n.dependents.len())
    }

    /// Returns all edges in insertion order
    ///
    /// Feeding the result to [`DependencyGraph::from_edges`] rebuilds the
    /// same neighbour order on both sides of every edge.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.edge_log.clone()
    }

    /// Returns all tasks in topological order (dependencies before dependents)
    pub fn topological_order(&self) -> Result<Vec<TaskId>, GraphError> {
        let mut graph: DiGraph<&TaskId, ()> = DiGraph::with_capacity(self.len(), self.edge_log.len());
        let mut index: HashMap<&TaskId, NodeIndex> = HashMap::with_capacity(self.len());

        for id in &self.order {
            index.insert(id, graph.add_node(id));
        }
        for edge in &self.edge_log {
            graph.add_edge(index[&edge.depends_on], index[&edge.task], ());
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|idx| graph[idx].clone()).collect()),
            Err(cycle) => {
                // Unreachable while insertion keeps the graph acyclic
                let id = graph[cycle.node_id()].clone();
                Err(GraphError::CycleDetected(id.clone(), id))
            }
        }
    }

    /// Returns true if the graph contains the task
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.nodes.contains_key(task_id)
    }

    /// Returns the number of tasks in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of edges
    pub fn edge_count(&self) -> usize {
        self.edge_log.len()
    }

    /// Returns all task IDs in registration order
    pub fn task_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    #[test]
    fn empty_graph() {
        let graph = DependencyGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn add_dependency() {
        let mut graph = DependencyGraph::new();
        let (a, b) = (id("a"), id("b"));

        // a depends on b
        graph.add_dependency(&a, &b).unwrap();

        assert_eq!(graph.dependencies(&a), vec![b.clone()]);
        assert_eq!(graph.dependents(&b), vec![a.clone()]);
        assert!(graph.dependencies(&b).is_empty());
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn duplicate_edge_is_noop() {
        let mut graph = DependencyGraph::new();
        let (a, b) = (id("a"), id("b"));

        graph.add_dependency(&a, &b).unwrap();
        graph.add_dependency(&a, &b).unwrap();

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.dependents(&b).len(), 1);
    }

    #[test]
    fn cycle_detection_leaves_graph_unchanged() {
        let mut graph = DependencyGraph::new();
        let (a, b, c) = (id("a"), id("b"), id("c"));

        graph.add_dependency(&a, &b).unwrap();
        graph.add_dependency(&b, &c).unwrap();
        let before = graph.edge_count();

        let result = graph.add_dependency(&c, &a);

        assert_eq!(result, Err(GraphError::CycleDetected(c.clone(), a.clone())));
        assert_eq!(graph.edge_count(), before);
        assert!(graph.dependencies(&c).is_empty());
        assert!(graph.dependents(&a).is_empty());
    }

    #[test]
    fn two_node_cycle_rejected() {
        let mut graph = DependencyGraph::new();
        let (a, b) = (id("a"), id("b"));

        graph.add_dependency(&a, &b).unwrap();
        assert!(matches!(
            graph.add_dependency(&b, &a),
            Err(GraphError::CycleDetected(_, _))
        ));
    }

    #[test]
    fn self_dependency_rejected() {
        let mut graph = DependencyGraph::new();
        let a = id("a");

        let result = graph.add_dependency(&a, &a);
        assert_eq!(result, Err(GraphError::SelfDependency(a.clone())));
        assert!(graph.is_empty());
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        let (a, b, c, d) = (id("a"), id("b"), id("c"), id("d"));

        graph.add_dependency(&a, &b).unwrap();
        graph.add_dependency(&a, &c).unwrap();
        graph.add_dependency(&b, &d).unwrap();
        graph.add_dependency(&c, &d).unwrap();

        assert_eq!(graph.edge_count(), 4);
        assert!(graph.would_create_cycle(&d, &a));
        assert!(!graph.would_create_cycle(&b, &c));
    }

    #[test]
    fn unknown_task_queries_are_empty() {
        let graph = DependencyGraph::new();
        let ghost = id("ghost");

        assert!(graph.dependencies(&ghost).is_empty());
        assert!(graph.dependents(&ghost).is_empty());
        assert_eq!(graph.dependent_count(&ghost), 0);
        assert!(!graph.contains(&ghost));
    }

    #[test]
    fn dependencies_keep_insertion_order() {
        let mut graph = DependencyGraph::new();
        let a = id("a");
        let deps = [id("z"), id("m"), id("b")];

        for dep in &deps {
            graph.add_dependency(&a, dep).unwrap();
        }

        assert_eq!(graph.dependencies(&a), deps.to_vec());
    }

    #[test]
    fn remove_dependency() {
        let mut graph = DependencyGraph::new();
        let (a, b) = (id("a"), id("b"));

        graph.add_dependency(&a, &b).unwrap();

        assert!(graph.remove_dependency(&a, &b));
        assert!(graph.dependencies(&a).is_empty());
        assert!(graph.dependents(&b).is_empty());
        assert_eq!(graph.edge_count(), 0);

        // Absent edge is a no-op
        assert!(!graph.remove_dependency(&a, &b));
        assert!(!graph.remove_dependency(&id("x"), &id("y")));
    }

    #[test]
    fn removed_edge_allows_reverse_edge() {
        let mut graph = DependencyGraph::new();
        let (a, b) = (id("a"), id("b"));

        graph.add_dependency(&a, &b).unwrap();
        graph.remove_dependency(&a, &b);
        graph.add_dependency(&b, &a).unwrap();

        assert_eq!(graph.dependencies(&b), vec![a]);
    }

    #[test]
    fn remove_task() {
        let mut graph = DependencyGraph::new();
        let (a, b, c) = (id("a"), id("b"), id("c"));

        graph.add_dependency(&a, &b).unwrap();
        graph.add_dependency(&b, &c).unwrap();

        assert!(graph.remove_task(&b));
        assert!(!graph.contains(&b));
        assert!(graph.dependencies(&a).is_empty());
        assert!(graph.dependents(&c).is_empty());
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.remove_task(&b));
    }

    #[test]
    fn topological_order() {
        let mut graph = DependencyGraph::new();
        let (a, b, c) = (id("a"), id("b"), id("c"));

        // a depends on b, b depends on c
        graph.add_dependency(&a, &b).unwrap();
        graph.add_dependency(&b, &c).unwrap();

        let order = graph.topological_order().unwrap();

        let pos = |t: &TaskId| order.iter().position(|x| x == t).unwrap();
        assert!(pos(&c) < pos(&b));
        assert!(pos(&b) < pos(&a));
    }

    #[test]
    fn edges_roundtrip_through_from_edges() {
        let mut graph = DependencyGraph::new();
        let (a, b, c) = (id("a"), id("b"), id("c"));

        graph.add_dependency(&a, &c).unwrap();
        graph.add_dependency(&a, &b).unwrap();
        graph.add_dependency(&b, &c).unwrap();

        let rebuilt = DependencyGraph::from_edges(&graph.edges()).unwrap();

        assert_eq!(rebuilt.edge_count(), 3);
        assert_eq!(rebuilt.dependencies(&a), vec![c.clone(), b.clone()]);
    }

    #[test]
    fn edges_come_back_in_insertion_order() {
        let mut graph = DependencyGraph::new();
        let (a, b, c, d) = (id("a"), id("b"), id("c"), id("d"));

        graph.add_dependency(&a, &b).unwrap();
        graph.add_dependency(&c, &d).unwrap();
        graph.add_dependency(&b, &d).unwrap();

        assert_eq!(
            graph.edges(),
            vec![
                DependencyEdge::new(a.clone(), b.clone()),
                DependencyEdge::new(c.clone(), d.clone()),
                DependencyEdge::new(b.clone(), d.clone()),
            ]
        );

        let rebuilt = DependencyGraph::from_edges(&graph.edges()).unwrap();
        assert_eq!(graph.dependents(&d), vec![c.clone(), b.clone()]);
        assert_eq!(rebuilt.dependents(&d), graph.dependents(&d));
        assert_eq!(rebuilt.edges(), graph.edges());
    }

    #[test]
    fn removals_keep_remaining_edge_order() {
        let mut graph = DependencyGraph::new();
        let (a, b, c, d) = (id("a"), id("b"), id("c"), id("d"));

        graph.add_dependency(&c, &d).unwrap();
        graph.add_dependency(&a, &b).unwrap();
        graph.add_dependency(&a, &d).unwrap();
        graph.add_dependency(&b, &c).unwrap();

        graph.remove_dependency(&a, &b);
        assert_eq!(
            graph.edges(),
            vec![
                DependencyEdge::new(c.clone(), d.clone()),
                DependencyEdge::new(a.clone(), d.clone()),
                DependencyEdge::new(b.clone(), c.clone()),
            ]
        );

        graph.remove_task(&d);
        assert_eq!(graph.edges(), vec![DependencyEdge::new(b, c)]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn from_edges_rejects_cycles() {
        let edges = vec![
            DependencyEdge::new(id("a"), id("b")),
            DependencyEdge::new(id("b"), id("a")),
        ];

        assert!(matches!(
            DependencyGraph::from_edges(&edges),
            Err(GraphError::CycleDetected(_, _))
        ));
    }

    #[test]
    fn long_chain_cycle_check_is_iterative() {
        let mut graph = DependencyGraph::new();
        let ids: Vec<TaskId> = (0..20_000).map(|i| id(&format!("n{}", i))).collect();

        for pair in ids.windows(2) {
            graph.add_dependency(&pair[0], &pair[1]).unwrap();
        }

        let first = &ids[0];
        let last = &ids[ids.len() - 1];
        assert!(graph.would_create_cycle(last, first));
    }
}
