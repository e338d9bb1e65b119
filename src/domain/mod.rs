//! Domain models for taskgraph
//!
//! Contains the dependency graph engine and priority scoring without any
//! I/O concerns. Storage is reached only through the traits in `ports`.

mod id;
mod task;
mod graph;
mod traversal;
mod readiness;
mod priority;
mod planner;
mod ports;
mod service;

pub use id::{IdError, TaskId};
pub use task::{Priority, Task, TaskStatus};
pub use graph::{
    DependencyEdge, DependencyGraph, GraphError, DEFAULT_MAX_CHAIN_ENTRIES, DEFAULT_MAX_DEPTH,
};
pub use traversal::ChainEntry;
pub use readiness::{blockers, can_start};
pub use priority::{priority_score, suggest_priority, PriorityScorer, MAX_SCORE};
pub use planner::{
    auto_adjust, recommend, recommend_for_user, AdjustError, AdjustReport, PriorityChange,
    Recommendation,
};
pub use ports::{EdgeStore, NoopHook, ReadinessHook, TaskAccessor};
pub use service::{DependencyService, ServiceError, SharedGraph};
