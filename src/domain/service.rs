//! Shared graph access and the persistence-backed dependency service
//!
//! [`SharedGraph`] is a single-writer wrapper: every insertion holds the
//! write lock across the cycle check and the insert, and every read-side
//! query runs against one read guard, so a traversal never sees a
//! half-applied mutation.
//!
//! [`DependencyService`] pairs a [`SharedGraph`] with an [`EdgeStore`]. An
//! edge reaches memory only after the store accepted it.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::graph::{DependencyEdge, DependencyGraph, GraphError, DEFAULT_MAX_CHAIN_ENTRIES};
use super::id::TaskId;
use super::ports::{EdgeStore, NoopHook, ReadinessHook};
use super::readiness::can_start;
use super::task::TaskStatus;
use super::traversal::ChainEntry;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Edge store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ServiceError {
    fn store<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        ServiceError::Store(Box::new(err))
    }
}

/// A dependency graph behind a single-writer lock
#[derive(Debug, Default)]
pub struct SharedGraph {
    inner: RwLock<DependencyGraph>,
}

impl SharedGraph {
    pub fn new(graph: DependencyGraph) -> Self {
        Self {
            inner: RwLock::new(graph),
        }
    }

    /// Runs `f` against one consistent view of the graph
    pub fn read<R>(&self, f: impl FnOnce(&DependencyGraph) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<R>(&self, f: impl FnOnce(&mut DependencyGraph) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Clones the current graph
    pub fn snapshot(&self) -> DependencyGraph {
        self.read(DependencyGraph::clone)
    }

    pub fn replace(&self, graph: DependencyGraph) {
        self.write(|g| *g = graph);
    }

    pub fn add_dependency(&self, task: &TaskId, depends_on: &TaskId) -> Result<(), GraphError> {
        self.write(|g| g.add_dependency(task, depends_on))
    }

    /// Validates, runs `persist`, then inserts, all under the write lock
    ///
    /// Returns `Ok(false)` without calling `persist` when the edge exists.
    /// If `persist` fails the graph is unchanged.
    pub fn add_dependency_with<E>(
        &self,
        task: &TaskId,
        depends_on: &TaskId,
        persist: impl FnOnce(&DependencyEdge) -> Result<(), E>,
    ) -> Result<bool, E>
    where
        E: From<GraphError>,
    {
        self.write(|g| {
            if !g.validate_dependency(task, depends_on)? {
                return Ok(false);
            }
            persist(&DependencyEdge::new(task.clone(), depends_on.clone()))?;
            g.add_dependency(task, depends_on)?;
            Ok(true)
        })
    }

    pub fn remove_dependency(&self, task: &TaskId, depends_on: &TaskId) -> bool {
        self.write(|g| g.remove_dependency(task, depends_on))
    }

    pub fn dependencies(&self, task: &TaskId) -> Vec<TaskId> {
        self.read(|g| g.dependencies(task))
    }

    pub fn dependents(&self, task: &TaskId) -> Vec<TaskId> {
        self.read(|g| g.dependents(task))
    }

    pub fn dependency_chain(
        &self,
        task: &TaskId,
        max_depth: usize,
        max_entries: usize,
    ) -> Result<Vec<ChainEntry>, GraphError> {
        self.read(|g| g.dependency_chain(task, max_depth, max_entries))
    }

    pub fn critical_path(&self, task: &TaskId, max_depth: usize) -> Result<Vec<TaskId>, GraphError> {
        self.read(|g| g.critical_path(task, max_depth))
    }

    pub fn can_start(&self, task: &TaskId, statuses: &HashMap<TaskId, TaskStatus>) -> bool {
        self.read(|g| can_start(g, task, statuses))
    }
}

/// Dependency graph backed by an edge store
pub struct DependencyService<E> {
    store: E,
    graph: SharedGraph,
    max_depth: usize,
    max_chain_entries: usize,
    hook: Box<dyn ReadinessHook>,
}

impl<E: EdgeStore> DependencyService<E> {
    /// Loads every edge from `store` into a fresh graph
    pub fn open(store: E, max_depth: usize) -> Result<Self, ServiceError> {
        let graph = Self::load_graph(&store)?;
        info!(
            tasks = graph.len(),
            edges = graph.edge_count(),
            "loaded dependency graph"
        );

        Ok(Self {
            store,
            graph: SharedGraph::new(graph),
            max_depth,
            max_chain_entries: DEFAULT_MAX_CHAIN_ENTRIES,
            hook: Box::new(NoopHook),
        })
    }

    fn load_graph(store: &E) -> Result<DependencyGraph, ServiceError> {
        let edges = store.load().map_err(ServiceError::store)?;
        Ok(DependencyGraph::from_edges(&edges)?)
    }

    /// Installs the hook notified when a task becomes startable
    pub fn with_hook(mut self, hook: impl ReadinessHook + 'static) -> Self {
        self.hook = Box::new(hook);
        self
    }

    /// Caps the number of entries `dependency_chain` may return
    pub fn with_max_chain_entries(mut self, max_chain_entries: usize) -> Self {
        self.max_chain_entries = max_chain_entries;
        self
    }

    /// Re-reads the store, picking up edges written by other processes
    pub fn reload(&self) -> Result<(), ServiceError> {
        let graph = Self::load_graph(&self.store)?;
        self.graph.replace(graph);
        Ok(())
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn store(&self) -> &E {
        &self.store
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Adds `task -> depends_on`, persisting it before it becomes visible
    pub fn add_dependency(&self, task: &TaskId, depends_on: &TaskId) -> Result<(), ServiceError> {
        let added = self.graph.add_dependency_with(task, depends_on, |edge| {
            self.store.insert(edge).map_err(ServiceError::store)
        });

        match added {
            Ok(true) => {
                info!(%task, %depends_on, "added dependency");
                Ok(())
            }
            Ok(false) => {
                debug!(%task, %depends_on, "dependency already present");
                Ok(())
            }
            Err(e) => {
                warn!(%task, %depends_on, error = %e, "dependency rejected");
                Err(e)
            }
        }
    }

    /// Removes `task -> depends_on`
    ///
    /// If this clears the last incomplete dependency of a task that is not
    /// itself completed, the hook is notified.
    pub fn remove_dependency(
        &self,
        task: &TaskId,
        depends_on: &TaskId,
        statuses: &HashMap<TaskId, TaskStatus>,
    ) -> Result<bool, ServiceError> {
        let edge = DependencyEdge::new(task.clone(), depends_on.clone());

        let (removed, unblocked) = self.graph.write(|g| -> Result<_, ServiceError> {
            let was_startable = can_start(g, task, statuses);
            let stored = self.store.remove(&edge).map_err(ServiceError::store)?;
            let removed = g.remove_dependency(task, depends_on) || stored;
            let unblocked = removed
                && !was_startable
                && can_start(g, task, statuses)
                && !statuses.get(task).is_some_and(|s| s.is_complete());
            Ok((removed, unblocked))
        })?;

        if removed {
            info!(%task, %depends_on, "removed dependency");
        }
        if unblocked {
            self.hook.on_startable(task);
        }
        Ok(removed)
    }

    /// Drops a task and all its edges
    pub fn remove_task(&self, task: &TaskId) -> Result<usize, ServiceError> {
        self.graph.write(|g| {
            let removed = self.store.remove_task(task).map_err(ServiceError::store)?;
            g.remove_task(task);
            Ok(removed)
        })
    }

    /// Reports a status change made by the task owner
    ///
    /// `statuses` must already reflect the new status. When `task` moved into
    /// completed, every dependent that is now startable is returned and
    /// passed to the hook.
    pub fn status_changed(
        &self,
        task: &TaskId,
        previous: TaskStatus,
        statuses: &HashMap<TaskId, TaskStatus>,
    ) -> Vec<TaskId> {
        let now_complete = statuses.get(task).is_some_and(|s| s.is_complete());
        if previous.is_complete() || !now_complete {
            return Vec::new();
        }

        let startable: Vec<TaskId> = self.graph.read(|g| {
            g.dependents(task)
                .into_iter()
                .filter(|d| !statuses.get(d).is_some_and(|s| s.is_complete()))
                .filter(|d| can_start(g, d, statuses))
                .collect()
        });

        for dependent in &startable {
            debug!(task = %dependent, unblocked_by = %task, "task became startable");
            self.hook.on_startable(dependent);
        }
        startable
    }

    pub fn dependencies(&self, task: &TaskId) -> Vec<TaskId> {
        self.graph.dependencies(task)
    }

    pub fn dependents(&self, task: &TaskId) -> Vec<TaskId> {
        self.graph.dependents(task)
    }

    pub fn dependency_chain(&self, task: &TaskId) -> Result<Vec<ChainEntry>, GraphError> {
        self.graph
            .dependency_chain(task, self.max_depth, self.max_chain_entries)
    }

    pub fn critical_path(&self, task: &TaskId) -> Result<Vec<TaskId>, GraphError> {
        self.graph.critical_path(task, self.max_depth)
    }

    pub fn can_start(&self, task: &TaskId, statuses: &HashMap<TaskId, TaskStatus>) -> bool {
        self.graph.can_start(task, statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::{Arc, Mutex};

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    #[derive(Debug, Error)]
    #[error("store offline")]
    struct Offline;

    /// In-memory edge store that can be switched into a failing mode
    #[derive(Default)]
    struct MemoryEdges {
        edges: Mutex<Vec<DependencyEdge>>,
        fail_writes: Mutex<bool>,
    }

    impl MemoryEdges {
        fn set_failing(&self, failing: bool) {
            *self.fail_writes.lock().unwrap() = failing;
        }

        fn len(&self) -> usize {
            self.edges.lock().unwrap().len()
        }
    }

    impl EdgeStore for MemoryEdges {
        type Error = Offline;

        fn load(&self) -> Result<Vec<DependencyEdge>, Offline> {
            Ok(self.edges.lock().unwrap().clone())
        }

        fn insert(&self, edge: &DependencyEdge) -> Result<(), Offline> {
            if *self.fail_writes.lock().unwrap() {
                return Err(Offline);
            }
            self.edges.lock().unwrap().push(edge.clone());
            Ok(())
        }

        fn remove(&self, edge: &DependencyEdge) -> Result<bool, Offline> {
            let mut edges = self.edges.lock().unwrap();
            let before = edges.len();
            edges.retain(|e| e != edge);
            Ok(edges.len() != before)
        }

        fn remove_task(&self, task: &TaskId) -> Result<usize, Offline> {
            let mut edges = self.edges.lock().unwrap();
            let before = edges.len();
            edges.retain(|e| &e.task != task && &e.depends_on != task);
            Ok(before - edges.len())
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<TaskId>>>, impl ReadinessHook + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let hook = move |task: &TaskId| sink.lock().unwrap().push(task.clone());
        (seen, hook)
    }

    #[test]
    fn shared_graph_add_with_skips_persist_for_existing_edge() {
        let shared = SharedGraph::default();
        let (a, b) = (id("a"), id("b"));
        let calls = RefCell::new(0);

        let persist = |_: &DependencyEdge| -> Result<(), GraphError> {
            *calls.borrow_mut() += 1;
            Ok(())
        };

        assert_eq!(shared.add_dependency_with(&a, &b, persist), Ok(true));
        assert_eq!(shared.add_dependency_with(&a, &b, persist), Ok(false));
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn shared_graph_rejects_cycle_before_persist() {
        let shared = SharedGraph::default();
        let (a, b) = (id("a"), id("b"));
        shared.add_dependency(&a, &b).unwrap();

        let result = shared.add_dependency_with(&b, &a, |_| -> Result<(), GraphError> {
            panic!("persist must not run for a rejected edge")
        });

        assert!(matches!(result, Err(GraphError::CycleDetected(_, _))));
        assert_eq!(shared.read(|g| g.edge_count()), 1);
    }

    #[test]
    fn service_persists_and_reloads() {
        let service = DependencyService::open(MemoryEdges::default(), 16).unwrap();
        let (a, b, c) = (id("a"), id("b"), id("c"));

        service.add_dependency(&a, &b).unwrap();
        service.add_dependency(&b, &c).unwrap();
        assert_eq!(service.store().len(), 2);

        service.reload().unwrap();
        assert_eq!(service.critical_path(&a).unwrap(), vec![a, b, c]);
    }

    #[test]
    fn service_cycle_leaves_store_unchanged() {
        let service = DependencyService::open(MemoryEdges::default(), 16).unwrap();
        let (a, b, c) = (id("a"), id("b"), id("c"));

        service.add_dependency(&a, &b).unwrap();
        service.add_dependency(&b, &c).unwrap();

        let err = service.add_dependency(&c, &a).unwrap_err();
        assert!(matches!(err, ServiceError::Graph(GraphError::CycleDetected(_, _))));
        assert_eq!(service.store().len(), 2);
        assert_eq!(service.graph().read(|g| g.edge_count()), 2);

        let err = service.add_dependency(&a, &a).unwrap_err();
        assert!(matches!(err, ServiceError::Graph(GraphError::SelfDependency(_))));
    }

    #[test]
    fn store_failure_keeps_graph_unchanged() {
        let service = DependencyService::open(MemoryEdges::default(), 16).unwrap();
        let (a, b) = (id("a"), id("b"));

        service.store().set_failing(true);
        let err = service.add_dependency(&a, &b).unwrap_err();

        assert!(matches!(err, ServiceError::Store(_)));
        assert!(service.dependencies(&a).is_empty());
        assert!(service.dependents(&b).is_empty());
    }

    #[test]
    fn completing_a_task_notifies_unblocked_dependents() {
        let (seen, hook) = recorder();
        let service = DependencyService::open(MemoryEdges::default(), 16)
            .unwrap()
            .with_hook(hook);
        let (a, b, c, d) = (id("a"), id("b"), id("c"), id("d"));

        // b and c depend on a; c also depends on d
        service.add_dependency(&b, &a).unwrap();
        service.add_dependency(&c, &a).unwrap();
        service.add_dependency(&c, &d).unwrap();

        let mut statuses = HashMap::from([
            (a.clone(), TaskStatus::Completed),
            (b.clone(), TaskStatus::Pending),
            (c.clone(), TaskStatus::Pending),
            (d.clone(), TaskStatus::InProgress),
        ]);

        let startable = service.status_changed(&a, TaskStatus::InProgress, &statuses);
        assert_eq!(startable, vec![b.clone()]);
        assert_eq!(*seen.lock().unwrap(), vec![b.clone()]);

        // Repeating a completed -> completed report is silent
        assert!(service
            .status_changed(&a, TaskStatus::Completed, &statuses)
            .is_empty());

        statuses.insert(d.clone(), TaskStatus::Completed);
        assert_eq!(
            service.status_changed(&d, TaskStatus::InProgress, &statuses),
            vec![c.clone()]
        );
        assert_eq!(*seen.lock().unwrap(), vec![b, c]);
    }

    #[test]
    fn removing_last_blocker_notifies() {
        let (seen, hook) = recorder();
        let service = DependencyService::open(MemoryEdges::default(), 16)
            .unwrap()
            .with_hook(hook);
        let (a, b) = (id("a"), id("b"));

        service.add_dependency(&a, &b).unwrap();
        let statuses = HashMap::from([(a.clone(), TaskStatus::Pending), (b.clone(), TaskStatus::Pending)]);

        assert!(service.remove_dependency(&a, &b, &statuses).unwrap());
        assert_eq!(*seen.lock().unwrap(), vec![a.clone()]);

        // Absent edge is not an error and not a notification
        assert!(!service.remove_dependency(&a, &b, &statuses).unwrap());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn remove_task_drops_edges_everywhere() {
        let service = DependencyService::open(MemoryEdges::default(), 16).unwrap();
        let (a, b, c) = (id("a"), id("b"), id("c"));
        service.add_dependency(&a, &b).unwrap();
        service.add_dependency(&b, &c).unwrap();

        assert_eq!(service.remove_task(&b).unwrap(), 2);
        assert_eq!(service.store().len(), 0);
        assert!(service.dependencies(&a).is_empty());
    }

    #[test]
    fn service_enforces_depth_ceiling() {
        let service = DependencyService::open(MemoryEdges::default(), 1).unwrap();
        let (a, b, c) = (id("a"), id("b"), id("c"));
        service.add_dependency(&a, &b).unwrap();
        service.add_dependency(&b, &c).unwrap();

        assert!(matches!(
            service.dependency_chain(&a),
            Err(GraphError::TooDeep { limit: 1, .. })
        ));
        assert_eq!(service.dependency_chain(&b).unwrap().len(), 2);
    }

    #[test]
    fn service_enforces_chain_budget() {
        let service = DependencyService::open(MemoryEdges::default(), 16)
            .unwrap()
            .with_max_chain_entries(4);
        let (a, b, c, d) = (id("a"), id("b"), id("c"), id("d"));
        // Diamond: d is listed twice, five entries in total
        service.add_dependency(&a, &b).unwrap();
        service.add_dependency(&a, &c).unwrap();
        service.add_dependency(&b, &d).unwrap();
        service.add_dependency(&c, &d).unwrap();

        assert!(matches!(
            service.dependency_chain(&a),
            Err(GraphError::ChainTooLarge { limit: 4, .. })
        ));
        assert_eq!(service.dependency_chain(&b).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_inserts_never_form_a_cycle() {
        let shared = Arc::new(SharedGraph::default());
        let ids: Vec<TaskId> = (0..8).map(|i| id(&format!("n{}", i))).collect();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let shared = Arc::clone(&shared);
                let ids = ids.clone();
                std::thread::spawn(move || {
                    for i in 0..ids.len() {
                        for j in 0..ids.len() {
                            // Threads race opposite directions on the same pairs
                            let (x, y) = if t % 2 == 0 { (i, j) } else { (j, i) };
                            let _ = shared.add_dependency(&ids[x], &ids[y]);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(shared.read(|g| g.topological_order()).is_ok());
    }
}
