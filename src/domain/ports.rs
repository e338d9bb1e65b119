//! Collaborator interfaces
//!
//! The graph engine owns no storage. Task snapshots come from a
//! [`TaskAccessor`], edges are made durable through an [`EdgeStore`], and
//! readiness changes are announced to a [`ReadinessHook`].

use super::graph::DependencyEdge;
use super::id::TaskId;
use super::task::{Priority, Task};

/// Read access to task snapshots plus the one write the engine performs
pub trait TaskAccessor {
    type Error: std::error::Error + Send + Sync + 'static;

    /// All tasks, in retrieval order
    fn tasks(&self) -> Result<Vec<Task>, Self::Error>;

    fn task(&self, id: &TaskId) -> Result<Option<Task>, Self::Error> {
        Ok(self.tasks()?.into_iter().find(|t| &t.id == id))
    }

    /// Tasks assigned to `user`, in retrieval order
    fn assigned_to(&self, user: &str) -> Result<Vec<Task>, Self::Error> {
        Ok(self
            .tasks()?
            .into_iter()
            .filter(|t| t.assignee.as_deref() == Some(user))
            .collect())
    }

    /// Stages a priority change; durable only after [`TaskAccessor::commit`]
    fn set_priority(&mut self, id: &TaskId, priority: Priority) -> Result<(), Self::Error>;

    fn commit(&mut self) -> Result<(), Self::Error>;
}

/// Durable storage for dependency edges
pub trait EdgeStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every edge in insertion order, read as one snapshot
    fn load(&self) -> Result<Vec<DependencyEdge>, Self::Error>;

    fn insert(&self, edge: &DependencyEdge) -> Result<(), Self::Error>;

    /// Returns true if the edge existed
    fn remove(&self, edge: &DependencyEdge) -> Result<bool, Self::Error>;

    /// Drops every edge touching `task`, returning how many were removed
    fn remove_task(&self, task: &TaskId) -> Result<usize, Self::Error>;
}

/// Receives tasks that just became startable
pub trait ReadinessHook: Send + Sync {
    fn on_startable(&self, task: &TaskId);
}

impl<F> ReadinessHook for F
where
    F: Fn(&TaskId) + Send + Sync,
{
    fn on_startable(&self, task: &TaskId) {
        self(task)
    }
}

/// Hook that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl ReadinessHook for NoopHook {
    fn on_startable(&self, _task: &TaskId) {}
}
