//! Readiness evaluation
//!
//! A task can start once every direct dependency is completed. This is
//! advisory: nothing here changes a task's status.

use std::collections::HashMap;

use super::graph::DependencyGraph;
use super::id::TaskId;
use super::task::TaskStatus;

/// Returns true if every direct dependency of `task` is completed
///
/// A dependency with no known status counts as incomplete.
pub fn can_start(
    graph: &DependencyGraph,
    task: &TaskId,
    statuses: &HashMap<TaskId, TaskStatus>,
) -> bool {
    graph
        .dependency_slice(task)
        .iter()
        .all(|dep| is_complete(statuses, dep))
}

/// Returns the direct dependencies of `task` that are not yet completed
pub fn blockers(
    graph: &DependencyGraph,
    task: &TaskId,
    statuses: &HashMap<TaskId, TaskStatus>,
) -> Vec<TaskId> {
    graph
        .dependency_slice(task)
        .iter()
        .filter(|dep| !is_complete(statuses, dep))
        .cloned()
        .collect()
}

fn is_complete(statuses: &HashMap<TaskId, TaskStatus>, task: &TaskId) -> bool {
    statuses.get(task).is_some_and(|s| s.is_complete())
}

impl DependencyGraph {
    /// Returns tasks that are ready (not completed, no incomplete dependencies)
    ///
    /// Covers every task with a known status plus every task in the graph.
    pub fn ready_tasks(&self, statuses: &HashMap<TaskId, TaskStatus>) -> Vec<TaskId> {
        self.candidates(statuses)
            .into_iter()
            .filter(|task_id| can_start(self, task_id, statuses))
            .collect()
    }

    /// Returns tasks that are blocked (have incomplete dependencies)
    pub fn blocked_tasks(&self, statuses: &HashMap<TaskId, TaskStatus>) -> Vec<TaskId> {
        self.candidates(statuses)
            .into_iter()
            .filter(|task_id| !can_start(self, task_id, statuses))
            .collect()
    }

    /// Non-completed tasks: graph nodes first, then status-only tasks sorted by ID
    fn candidates(&self, statuses: &HashMap<TaskId, TaskStatus>) -> Vec<TaskId> {
        let mut extra: Vec<&TaskId> = statuses.keys().filter(|id| !self.contains(id)).collect();
        extra.sort();

        self.task_ids()
            .chain(extra)
            .filter(|id| !is_complete(statuses, id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    #[test]
    fn no_dependencies_can_start() {
        let graph = DependencyGraph::new();
        assert!(can_start(&graph, &id("a"), &HashMap::new()));
    }

    #[test]
    fn all_dependencies_must_be_completed() {
        let mut graph = DependencyGraph::new();
        let (a, b, c) = (id("a"), id("b"), id("c"));
        graph.add_dependency(&a, &b).unwrap();
        graph.add_dependency(&a, &c).unwrap();

        let mut statuses = HashMap::new();
        statuses.insert(b.clone(), TaskStatus::Completed);
        statuses.insert(c.clone(), TaskStatus::InProgress);

        assert!(!can_start(&graph, &a, &statuses));
        assert_eq!(blockers(&graph, &a, &statuses), vec![c.clone()]);

        statuses.insert(c.clone(), TaskStatus::Completed);
        assert!(can_start(&graph, &a, &statuses));
        assert!(blockers(&graph, &a, &statuses).is_empty());
    }

    #[test]
    fn cancelled_dependency_still_blocks() {
        let mut graph = DependencyGraph::new();
        let (a, b) = (id("a"), id("b"));
        graph.add_dependency(&a, &b).unwrap();

        let statuses = HashMap::from([(b, TaskStatus::Cancelled)]);
        assert!(!can_start(&graph, &a, &statuses));
    }

    #[test]
    fn unknown_dependency_status_blocks() {
        let mut graph = DependencyGraph::new();
        let (a, b) = (id("a"), id("b"));
        graph.add_dependency(&a, &b).unwrap();

        assert!(!can_start(&graph, &a, &HashMap::new()));
    }

    #[test]
    fn ready_and_blocked_tasks() {
        let mut graph = DependencyGraph::new();
        let (a, b, c) = (id("a"), id("b"), id("c"));

        // b depends on a, c only has a status
        graph.add_dependency(&b, &a).unwrap();

        let mut statuses = HashMap::new();
        statuses.insert(a.clone(), TaskStatus::Pending);
        statuses.insert(b.clone(), TaskStatus::Pending);
        statuses.insert(c.clone(), TaskStatus::Pending);

        let ready = graph.ready_tasks(&statuses);
        assert!(ready.contains(&a));
        assert!(ready.contains(&c));
        assert!(!ready.contains(&b));
        assert_eq!(graph.blocked_tasks(&statuses), vec![b.clone()]);

        statuses.insert(a.clone(), TaskStatus::Completed);

        let ready = graph.ready_tasks(&statuses);
        assert!(!ready.contains(&a)); // completed tasks are not ready
        assert!(ready.contains(&b));
        assert!(graph.blocked_tasks(&statuses).is_empty());
    }
}
